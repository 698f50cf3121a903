use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aggregate::{matrix_balance, time_pair_balance, time_pair_reason, time_pair_totals};
use crate::field_value::FieldValue;
use crate::ids::FieldId;
use crate::schema::{Field, FieldKind, SchemaModel, column_name, is_reserved_column};
use crate::time::resolve_target;
use crate::values::Snapshot;
use crate::visibility::{is_required, is_visible};

/// A structural problem that blocks saving a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub field_id: Option<FieldId>,
    pub message: String,
}

impl SchemaIssue {
    fn form(message: impl Into<String>) -> Self {
        Self {
            field_id: None,
            message: message.into(),
        }
    }

    fn field(field: &Field, message: impl Into<String>) -> Self {
        Self {
            field_id: Some(field.id),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn describe(field: &Field) -> String {
    match (field.label.trim(), field.key.trim()) {
        ("", "") => format!("unnamed {} field", field.kind.type_name()),
        ("", key) => format!("field '{key}'"),
        (label, _) => format!("field \"{label}\""),
    }
}

/// Save-time pass over a schema. Naming and column checks skip fields with
/// neither key nor label; structural checks apply to every field.
pub fn validate_schema(schema: &SchemaModel) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    if schema.tabs.is_empty() {
        issues.push(SchemaIssue::form("form needs at least one tab"));
    }

    let mut keys: HashMap<&str, &Field> = HashMap::new();
    let mut columns: HashMap<String, &Field> = HashMap::new();

    for field in &schema.fields {
        let name = describe(field);
        let key = field.key.trim();

        // Rows with neither key nor label are still being filled in.
        if !field.is_blank() {
            if key.is_empty() {
                issues.push(SchemaIssue::field(field, format!("{name} has no key")));
            }
            if field.label.trim().is_empty() {
                issues.push(SchemaIssue::field(field, format!("{name} has no label")));
            }

            if !key.is_empty() {
                if let Some(first) = keys.get(key) {
                    issues.push(SchemaIssue::field(
                        field,
                        format!("key '{key}' of {name} is already used by {}", describe(first)),
                    ));
                } else {
                    keys.insert(key, field);
                    let column = column_name(key);
                    if column.is_empty() {
                        issues.push(SchemaIssue::field(
                            field,
                            format!("key '{key}' of {name} yields no usable column name"),
                        ));
                    } else if is_reserved_column(&column) {
                        issues.push(SchemaIssue::field(
                            field,
                            format!("key '{key}' of {name} maps to reserved column '{column}'"),
                        ));
                    } else if let Some(first) = columns.get(&column) {
                        issues.push(SchemaIssue::field(
                            field,
                            format!(
                                "key '{key}' of {name} maps to column '{column}', already used by {}",
                                describe(first)
                            ),
                        ));
                    } else {
                        columns.insert(column, field);
                    }
                }
            }
        }

        match &field.kind {
            FieldKind::Select { options } if options.is_empty() => {
                issues.push(SchemaIssue::field(field, format!("{name} needs at least one option")));
            }
            FieldKind::Matrix(config) => {
                if config.rows.is_empty() {
                    issues.push(SchemaIssue::field(field, format!("{name} needs at least one row")));
                }
                if config.columns.is_empty() {
                    issues.push(SchemaIssue::field(field, format!("{name} needs at least one column")));
                }
            }
            FieldKind::RepeatableList(config) => {
                if let (Some(min), Some(max)) = (config.min_items, config.max_items)
                    && min > max
                {
                    issues.push(SchemaIssue::field(
                        field,
                        format!("{name} allows at most {max} items but requires {min}"),
                    ));
                }
            }
            _ => {}
        }

        if let Some(tab) = field.tab_id
            && schema.tab(tab).is_none()
        {
            issues.push(SchemaIssue::field(field, format!("{name} points at a deleted tab")));
        }
        if let Some(group) = field.group_id
            && schema.group(group).is_none()
        {
            issues.push(SchemaIssue::field(field, format!("{name} points at a deleted group")));
        }
        if let Some(pattern) = &field.validation.regex
            && let Err(e) = Regex::new(pattern)
        {
            issues.push(SchemaIssue::field(
                field,
                format!("{name} has an invalid pattern: {e}"),
            ));
        }
    }

    issues
}

/// A data problem that blocks final submission of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueIssue {
    pub key: String,
    pub message: String,
}

impl fmt::Display for ValueIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

fn numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Text(s) if s.contains(':') => Some(resolve_target(Some(value))),
        other => other.to_number(),
    }
}

/// Submit-time pass over a filled report. Hidden fields are skipped;
/// "not yet checkable" balances never block.
pub fn validate_values(schema: &SchemaModel, snapshot: &Snapshot) -> Vec<ValueIssue> {
    let mut issues = Vec::new();

    for field in schema.fields.iter().filter(|f| !f.key.is_empty()) {
        if matches!(field.kind, FieldKind::Container) || !is_visible(field, snapshot) {
            continue;
        }
        let mut push = |message: String| {
            issues.push(ValueIssue {
                key: field.key.clone(),
                message,
            })
        };
        let value = snapshot.get(&field.key);
        let empty = value.is_none_or(FieldValue::is_empty);

        if is_required(field, snapshot) && empty {
            push(format!("{} is required", field.label));
            continue;
        }
        let Some(value) = value.filter(|_| !empty) else {
            continue;
        };

        let rule = &field.validation;
        if matches!(field.kind, FieldKind::Number) {
            match value.to_number() {
                None => push(format!("{} must be a number", field.label)),
                Some(n) => {
                    if let Some(min) = rule.min
                        && n < min
                    {
                        push(format!("{} must be at least {min}", field.label));
                    }
                    if let Some(max) = rule.max
                        && n > max
                    {
                        push(format!("{} must be at most {max}", field.label));
                    }
                }
            }
        }

        if let Some(pattern) = &rule.regex
            && let Some(text) = value.as_text()
            && let Ok(re) = Regex::new(pattern)
            && !re.is_match(text)
        {
            push(format!("{} does not match the expected format", field.label));
        }

        if let Some(other) = &rule.must_be_less_or_equal_field
            && let (Some(mine), Some(limit)) = (numeric(value), snapshot.get(other).and_then(numeric))
            && mine > limit
        {
            push(format!("{} must not exceed {other}", field.label));
        }

        match &field.kind {
            FieldKind::RepeatableList(config) => {
                let count = value.as_list().map_or(0, <[_]>::len);
                if let Some(min) = config.min_items
                    && count < min as usize
                {
                    push(format!("{} needs at least {min} entries", field.label));
                }
                if let Some(max) = config.max_items
                    && count > max as usize
                {
                    push(format!("{} allows at most {max} entries", field.label));
                }
            }
            FieldKind::TimePair(config) => {
                let totals = time_pair_totals(Some(value));
                if config.require_reason_when_stop
                    && totals.stop > 0
                    && time_pair_reason(Some(value)).trim().is_empty()
                {
                    push(format!("{} needs a {} when stopped", field.label, config.reason_label.to_lowercase()));
                }
                if let Some(balance) = time_pair_balance(field, snapshot)
                    && balance.is_unbalanced()
                {
                    push(format!("{} work and stop times do not add up", field.label));
                }
            }
            FieldKind::Matrix(_) => {
                if let Some(balance) = matrix_balance(field, snapshot)
                    && balance.is_unbalanced()
                {
                    push(format!("{} total does not match", field.label));
                }
            }
            _ => {}
        }
    }

    issues
}
