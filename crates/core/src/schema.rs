use serde::{Deserialize, Serialize};

use crate::aggregate::Reducer;
use crate::field_value::FieldValue;
use crate::ids::{FieldId, GroupId, TabId};

/// Color used when a tab or group carries no valid hex color.
pub const DEFAULT_COLOR: &str = "#64748b";

/// Columns every synthesized report table owns; field columns may not reuse them.
pub const RESERVED_COLUMNS: [&str; 5] = ["id", "tracking_code", "report_date", "created_at", "updated_at"];

/// Catch-all structured payload column of every report table.
pub const PAYLOAD_COLUMN: &str = "data";

pub const MIN_FIELD_WIDTH: u8 = 1;
pub const MAX_FIELD_WIDTH: u8 = 4;
pub const MIN_GROUP_WIDTH: u8 = 1;
pub const MAX_GROUP_WIDTH: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatableListConfig {
    pub placeholder: String,
    pub min_items: Option<u32>,
    pub max_items: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePairConfig {
    pub work_label: String,
    pub stop_label: String,
    pub reason_label: String,
    pub require_reason_when_stop: bool,
}

impl Default for TimePairConfig {
    fn default() -> Self {
        Self {
            work_label: "Work time".into(),
            stop_label: "Stop time".into(),
            reason_label: "Stop reason".into(),
            require_reason_when_stop: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Cell content assumed for cells the snapshot does not carry.
    pub default_value: String,
    pub enforce_numeric: bool,
    pub numeric_ops: Vec<Reducer>,
}

/// The closed set of field kinds, each carrying its own configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Time,
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
    Textarea,
    Checkbox,
    RepeatableList(RepeatableListConfig),
    TimePair(TimePairConfig),
    Matrix(MatrixConfig),
    Attendance,
    Container,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Select { .. } => "select",
            FieldKind::Textarea => "textarea",
            FieldKind::Checkbox => "checkbox",
            FieldKind::RepeatableList(_) => "repeatable-list",
            FieldKind::TimePair(_) => "time-pair",
            FieldKind::Matrix(_) => "matrix",
            FieldKind::Attendance => "attendance",
            FieldKind::Container => "container",
        }
    }

    pub fn select(options: Vec<SelectOption>) -> Self {
        FieldKind::Select { options }
    }

    /// Kinds whose values are nested structures rather than scalars.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            FieldKind::Matrix(_) | FieldKind::RepeatableList(_) | FieldKind::TimePair(_) | FieldKind::Attendance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    pub field: String,
    pub equals: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_less_or_equal_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_must_equal_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    /// Header id shared by the fields rendered under one section.
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub width: u8,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub default_value: Option<FieldValue>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub validation: ValidationRule,
}

impl Field {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: FieldId::new(),
            key: key.into(),
            label: label.into(),
            kind,
            tab_id: None,
            section: None,
            group_id: None,
            width: MAX_FIELD_WIDTH,
            required: false,
            read_only: false,
            default_value: None,
            placeholder: None,
            help_text: None,
            validation: ValidationRule::default(),
        }
    }

    pub fn in_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_width(mut self, width: u8) -> Self {
        self.width = width.clamp(MIN_FIELD_WIDTH, MAX_FIELD_WIDTH);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_validation(mut self, validation: ValidationRule) -> Self {
        self.validation = validation;
        self
    }

    pub fn depends_on(mut self, field: impl Into<String>, equals: impl Into<FieldValue>) -> Self {
        self.validation.depends_on = Some(DependsOn {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn total_must_equal(mut self, field: impl Into<String>) -> Self {
        self.validation.total_must_equal_field = Some(field.into());
        self
    }

    /// Has the author started on this field at all?
    pub fn is_blank(&self) -> bool {
        self.key.trim().is_empty() && self.label.trim().is_empty()
    }

    pub fn matrix_config(&self) -> Option<&MatrixConfig> {
        match &self.kind {
            FieldKind::Matrix(config) => Some(config),
            _ => None,
        }
    }

    pub fn time_pair_config(&self) -> Option<&TimePairConfig> {
        match &self.kind {
            FieldKind::TimePair(config) => Some(config),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        self.width = self.width.clamp(MIN_FIELD_WIDTH, MAX_FIELD_WIDTH);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub label: String,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl Tab {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: TabId::new(),
            label: label.into(),
            color: DEFAULT_COLOR.to_string(),
            icon: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = normalize_color(color);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub color: String,
    pub width: u8,
}

impl Group {
    pub fn new(title: impl Into<String>, color: &str, width: u8) -> Self {
        Self {
            id: GroupId::new(),
            title: title.into(),
            color: normalize_color(color),
            width: width.clamp(MIN_GROUP_WIDTH, MAX_GROUP_WIDTH),
        }
    }
}

/// A form definition: the `{fields, tabs, groups}` triple the designer edits.
/// Structural invariants are checked by [`crate::validation::validate_schema`]
/// at save time, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub fields: Vec<Field>,
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Default for SchemaModel {
    fn default() -> Self {
        Self::blank()
    }
}

impl SchemaModel {
    pub fn blank() -> Self {
        Self {
            fields: Vec::new(),
            tabs: vec![Tab::new("General")],
            groups: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, crate::CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, crate::CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    // ---- fields ----

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_key(&self, key: &str) -> Option<&Field> {
        if key.is_empty() {
            return None;
        }
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn add_field(&mut self, mut field: Field) -> FieldId {
        field.normalize();
        let id = field.id;
        self.fields.push(field);
        id
    }

    /// Applies `edit` to the field with `id`; returns false if absent.
    pub fn update_field(&mut self, id: FieldId, edit: impl FnOnce(&mut Field)) -> bool {
        match self.fields.iter_mut().find(|f| f.id == id) {
            Some(field) => {
                edit(field);
                field.id = id;
                field.normalize();
                true
            }
            None => false,
        }
    }

    pub fn remove_field(&mut self, id: FieldId) -> Option<Field> {
        let index = self.fields.iter().position(|f| f.id == id)?;
        Some(self.fields.remove(index))
    }

    /// Moves a field to `index` (clamped to the end of the list).
    pub fn move_field(&mut self, id: FieldId, index: usize) -> bool {
        let Some(from) = self.fields.iter().position(|f| f.id == id) else {
            return false;
        };
        let field = self.fields.remove(from);
        let to = index.min(self.fields.len());
        self.fields.insert(to, field);
        true
    }

    /// Copies a field right after the original with a fresh id and a key
    /// that does not clash with any existing key.
    pub fn duplicate_field(&mut self, id: FieldId) -> Option<FieldId> {
        let index = self.fields.iter().position(|f| f.id == id)?;
        let mut copy = self.fields[index].clone();
        copy.id = FieldId::new();
        if !copy.key.is_empty() {
            let base = format!("{}_copy", copy.key);
            let mut candidate = base.clone();
            let mut n = 2;
            while self.field_by_key(&candidate).is_some() {
                candidate = format!("{base}{n}");
                n += 1;
            }
            copy.key = candidate;
        }
        let new_id = copy.id;
        self.fields.insert(index + 1, copy);
        Some(new_id)
    }

    // ---- tabs ----

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn first_tab(&self) -> Option<&Tab> {
        self.tabs.first()
    }

    pub fn add_tab(&mut self, mut tab: Tab) -> TabId {
        tab.color = normalize_color(&tab.color);
        let id = tab.id;
        self.tabs.push(tab);
        id
    }

    pub fn update_tab(&mut self, id: TabId, edit: impl FnOnce(&mut Tab)) -> bool {
        match self.tabs.iter_mut().find(|t| t.id == id) {
            Some(tab) => {
                edit(tab);
                tab.id = id;
                tab.color = normalize_color(&tab.color);
                true
            }
            None => false,
        }
    }

    /// Removes a tab. The last remaining tab cannot be removed; fields that
    /// pointed at the removed tab fall back to the first tab.
    pub fn remove_tab(&mut self, id: TabId) -> bool {
        if self.tabs.len() <= 1 {
            return false;
        }
        let Some(index) = self.tabs.iter().position(|t| t.id == id) else {
            return false;
        };
        self.tabs.remove(index);
        for field in &mut self.fields {
            if field.tab_id == Some(id) {
                field.tab_id = None;
            }
        }
        true
    }

    /// The tab a field renders in: its own tab when that exists, else the first tab.
    pub fn effective_tab(&self, field: &Field) -> Option<TabId> {
        match field.tab_id {
            Some(id) if self.tab(id).is_some() => Some(id),
            _ => self.first_tab().map(|t| t.id),
        }
    }

    pub fn fields_in_tab(&self, tab_id: TabId) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(move |f| self.effective_tab(f) == Some(tab_id))
    }

    // ---- groups ----

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn add_group(&mut self, group: Group) -> GroupId {
        let id = group.id;
        self.groups.push(group);
        id
    }

    pub fn update_group(&mut self, id: GroupId, edit: impl FnOnce(&mut Group)) -> bool {
        match self.groups.iter_mut().find(|g| g.id == id) {
            Some(group) => {
                edit(group);
                group.id = id;
                group.color = normalize_color(&group.color);
                group.width = group.width.clamp(MIN_GROUP_WIDTH, MAX_GROUP_WIDTH);
                true
            }
            None => false,
        }
    }

    /// Removes a group and detaches its fields; the fields themselves stay.
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.id != id);
        if self.groups.len() == before {
            return false;
        }
        for field in &mut self.fields {
            if field.group_id == Some(id) {
                field.group_id = None;
            }
        }
        true
    }

    pub fn fields_in_group(&self, id: GroupId) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.group_id == Some(id))
    }
}

/// Accepts `#rgb` / `#rrggbb` (lower-cased); anything else becomes [`DEFAULT_COLOR`].
pub fn normalize_color(color: &str) -> String {
    let color = color.trim();
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        color.to_ascii_lowercase()
    } else {
        DEFAULT_COLOR.to_string()
    }
}

/// Storage column derived from a field key: lower-cased, runs of anything
/// outside `[a-z0-9_]` and repeated underscores collapsed to one `_`,
/// leading/trailing underscores trimmed. May come out empty.
pub fn column_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name) || name == PAYLOAD_COLUMN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_sanitized() {
        assert_eq!(column_name("Line 1 Tonnage"), "line_1_tonnage");
        assert_eq!(column_name("__a--b__"), "a_b");
        assert_eq!(column_name("Über-Temp (°C)"), "ber_temp_c");
        assert_eq!(column_name("!!!"), "");
        assert_eq!(column_name("snake_case_ok"), "snake_case_ok");
    }

    #[test]
    fn colors_fall_back_to_sentinel() {
        assert_eq!(normalize_color("#ABC"), "#abc");
        assert_eq!(normalize_color("#12ab9F"), "#12ab9f");
        assert_eq!(normalize_color("red"), DEFAULT_COLOR);
        assert_eq!(normalize_color("#12345"), DEFAULT_COLOR);
    }

    #[test]
    fn widths_are_clamped() {
        let mut schema = SchemaModel::blank();
        let id = schema.add_field(Field::new("a", "A", FieldKind::Text).with_width(9));
        assert_eq!(schema.field(id).unwrap().width, 4);
        schema.update_field(id, |f| f.width = 0);
        assert_eq!(schema.field(id).unwrap().width, 1);
        let group = Group::new("Box", "#fff", 7);
        assert_eq!(group.width, 3);
    }

    #[test]
    fn removing_group_keeps_fields() {
        let mut schema = SchemaModel::blank();
        let group = schema.add_group(Group::new("Box", "#fff", 2));
        let id = schema.add_field(Field::new("a", "A", FieldKind::Text).in_group(group));
        assert!(schema.remove_group(group));
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.field(id).unwrap().group_id, None);
        assert!(!schema.remove_group(group));
    }

    #[test]
    fn removing_tab_moves_fields_to_first_tab() {
        let mut schema = SchemaModel::blank();
        let first = schema.tabs[0].id;
        let second = schema.add_tab(Tab::new("Downtime"));
        let id = schema.add_field(Field::new("a", "A", FieldKind::Text).in_tab(second));
        assert_eq!(schema.fields_in_tab(second).count(), 1);

        assert!(schema.remove_tab(second));
        assert_eq!(schema.field(id).unwrap().tab_id, None);
        assert_eq!(schema.fields_in_tab(first).count(), 1);
        assert!(!schema.remove_tab(first), "last tab must stay");
    }

    #[test]
    fn duplicate_gets_unique_key() {
        let mut schema = SchemaModel::blank();
        let id = schema.add_field(Field::new("temp", "Temp", FieldKind::Number));
        let copy = schema.duplicate_field(id).unwrap();
        let again = schema.duplicate_field(id).unwrap();
        assert_eq!(schema.field(copy).unwrap().key, "temp_copy");
        assert_eq!(schema.field(again).unwrap().key, "temp_copy2");
        assert_eq!(schema.fields[1].id, again);
    }

    #[test]
    fn move_field_clamps_index() {
        let mut schema = SchemaModel::blank();
        let a = schema.add_field(Field::new("a", "A", FieldKind::Text));
        let b = schema.add_field(Field::new("b", "B", FieldKind::Text));
        assert!(schema.move_field(a, 99));
        assert_eq!(schema.fields[0].id, b);
        assert_eq!(schema.fields[1].id, a);
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let field = Field::new(
            "grid",
            "Grid",
            FieldKind::Matrix(MatrixConfig {
                rows: vec!["A".into()],
                columns: vec!["x".into()],
                ..Default::default()
            }),
        );
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["kind"]["type"], "matrix");
        assert_eq!(json["kind"]["rows"][0], "A");

        let schema = SchemaModel {
            fields: vec![field],
            ..SchemaModel::blank()
        };
        let back = SchemaModel::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(back, schema);
    }
}
