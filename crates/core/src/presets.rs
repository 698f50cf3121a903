use crate::aggregate::Reducer;
use crate::schema::{
    Field, FieldKind, Group, MatrixConfig, RepeatableListConfig, SchemaModel, SelectOption, Tab,
    TimePairConfig, ValidationRule,
};

/// Value keys under which each production line keeps its feed schedule and
/// tonnage readings. They are report payload entries, not schema fields.
pub const LINE_FEEDS: [&str; 2] = ["feed_line1", "feed_line2"];
pub const LINE_TONNAGE: [&str; 2] = ["tons_line1", "tons_line2"];

fn line_time(key: &str, label: &str) -> Field {
    Field::new(
        key,
        label,
        FieldKind::TimePair(TimePairConfig {
            require_reason_when_stop: true,
            ..Default::default()
        }),
    )
    .total_must_equal("shift_duration")
}

fn output(key: &str, label: &str) -> Field {
    Field::new(key, label, FieldKind::Number)
        .with_width(2)
        .with_validation(ValidationRule {
            min: Some(0.0),
            ..Default::default()
        })
}

/// Shift report for a plant with two production lines: header data, line
/// work/stop balance against the shift length, a downtime matrix and the crew.
pub fn production_report() -> SchemaModel {
    let production = Tab::new("Production").with_color("#2563eb").with_icon("factory");
    let downtime = Tab::new("Downtime").with_color("#dc2626").with_icon("alert");
    let crew = Tab::new("Crew").with_color("#16a34a").with_icon("users");
    let (p, d, c) = (production.id, downtime.id, crew.id);

    let mut schema = SchemaModel {
        fields: Vec::new(),
        tabs: vec![production, downtime, crew],
        groups: Vec::new(),
    };
    let line1 = schema.add_group(Group::new("Line 1", "#dbeafe", 2));
    let line2 = schema.add_group(Group::new("Line 2", "#fef3c7", 2));

    schema.add_field(Field::new("report_day", "Report day", FieldKind::Date).required().in_tab(p).with_width(2));
    schema.add_field(
        Field::new(
            "shift",
            "Shift",
            FieldKind::select(vec![SelectOption::new("Day", "day"), SelectOption::new("Night", "night")]),
        )
        .required()
        .in_tab(p)
        .with_width(1),
    );
    schema.add_field(
        Field::new("shift_duration", "Shift duration", FieldKind::Time)
            .with_default("12:00")
            .in_tab(p)
            .with_width(1),
    );
    schema.add_field(line_time("line1_time", "Line 1 time").in_tab(p).in_section("lines").in_group(line1));
    schema.add_field(output("line1_output", "Line 1 output (t)").in_tab(p).in_section("lines").in_group(line1));
    schema.add_field(line_time("line2_time", "Line 2 time").in_tab(p).in_section("lines").in_group(line2));
    schema.add_field(output("line2_output", "Line 2 output (t)").in_tab(p).in_section("lines").in_group(line2));

    schema.add_field(Field::new("stopped", "Unplanned stop", FieldKind::Checkbox).in_tab(d));
    schema.add_field(
        Field::new("stop_reason", "Stop description", FieldKind::Textarea)
            .required()
            .depends_on("stopped", true)
            .in_tab(d),
    );
    schema.add_field(
        Field::new(
            "downtime",
            "Downtime minutes",
            FieldKind::Matrix(MatrixConfig {
                rows: vec!["Mechanical".into(), "Electrical".into(), "Process".into()],
                columns: vec!["Line 1".into(), "Line 2".into()],
                default_value: String::new(),
                enforce_numeric: true,
                numeric_ops: vec![Reducer::Sum, Reducer::Max],
            }),
        )
        .total_must_equal("downtime_total")
        .in_tab(d),
    );
    schema.add_field(Field::new("downtime_total", "Downtime total (min)", FieldKind::Number).in_tab(d).with_width(2));

    schema.add_field(Field::new("crew", "Crew on shift", FieldKind::Attendance).in_tab(c));
    schema.add_field(
        Field::new(
            "actions",
            "Follow-up actions",
            FieldKind::RepeatableList(RepeatableListConfig {
                placeholder: "Describe an action".into(),
                min_items: None,
                max_items: Some(10),
            }),
        )
        .in_tab(c),
    );
    schema
}
