use crate::field_value::FieldValue;
use crate::schema::Field;
use crate::values::Snapshot;

/// A field without a `depends_on` rule is always shown. Otherwise it is
/// shown iff the canonical string of the referenced value (missing reads as
/// empty) equals the canonical string of the expected value. Only raw
/// values are consulted, never other fields' visibility.
pub fn is_visible(field: &Field, snapshot: &Snapshot) -> bool {
    let Some(rule) = &field.validation.depends_on else {
        return true;
    };
    let actual = snapshot
        .get(&rule.field)
        .map(FieldValue::canonical_string)
        .unwrap_or_default();
    actual == rule.equals.canonical_string()
}

/// Hidden fields are never required.
pub fn is_required(field: &Field, snapshot: &Snapshot) -> bool {
    field.required && is_visible(field, snapshot)
}
