use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::schema::SchemaModel;

pub type Snapshot = BTreeMap<String, FieldValue>;

/// Current values of one form instance, keyed by field key. Writes are not
/// checked against the schema; resolvers interpret values at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueStore {
    values: Snapshot,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds every keyed field that declares a default value.
    pub fn with_defaults(schema: &SchemaModel) -> Self {
        let values = schema
            .fields
            .iter()
            .filter(|f| !f.key.is_empty())
            .filter_map(|f| f.default_value.clone().map(|v| (f.key.clone(), v)))
            .collect();
        Self { values }
    }

    pub fn from_snapshot(values: Snapshot) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Sets one value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Merge-style update: every entry in `updates` overwrites, the rest stay.
    pub fn merge<K, I>(&mut self, updates: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        for (key, value) in updates {
            self.values.insert(key.into(), value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.values.remove(key)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.values
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind};

    #[test]
    fn merge_overwrites_only_given_keys() {
        let mut store = ValueStore::new();
        store.set("a", 1.0);
        store.set("b", "keep");
        store.merge([("a", FieldValue::Number(2.0)), ("c", FieldValue::Boolean(true))]);
        assert_eq!(store.get("a"), Some(&FieldValue::Number(2.0)));
        assert_eq!(store.get("b"), Some(&FieldValue::text("keep")));
        assert_eq!(store.get("c"), Some(&FieldValue::Boolean(true)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn defaults_come_from_schema() {
        let mut schema = SchemaModel::blank();
        schema.add_field(Field::new("shift", "Shift", FieldKind::Text).with_default("day"));
        schema.add_field(Field::new("", "Unkeyed", FieldKind::Text).with_default("x"));
        schema.add_field(Field::new("notes", "Notes", FieldKind::Textarea));
        let store = ValueStore::with_defaults(&schema);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("shift"), Some(&FieldValue::text("day")));
    }
}
