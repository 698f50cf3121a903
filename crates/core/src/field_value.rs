use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One value in a form instance. Deserializes from plain JSON-like data:
/// records (matrix, attendance, time-pair, feed schedules) are nested maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        Self::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Null, blank text, and empty collections all count as "nothing entered".
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Record(map) => map.is_empty(),
            FieldValue::Boolean(_) | FieldValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Record member lookup; `None` for non-records and absent keys.
    pub fn member(&self, key: &str) -> Option<&FieldValue> {
        self.as_record().and_then(|map| map.get(key))
    }

    /// Permissive numeric reading: numbers as-is, numeric text parsed,
    /// everything else (and non-finite results) is `None`.
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Canonical string form used for equality checks in conditional
    /// visibility. Null renders as the empty string; integral numbers
    /// render without a fractional part.
    pub fn canonical_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::canonical_string)
                .collect::<Vec<_>>()
                .join(","),
            FieldValue::Record(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_coercion() {
        assert_eq!(FieldValue::Null.canonical_string(), "");
        assert_eq!(FieldValue::Number(3.0).canonical_string(), "3");
        assert_eq!(FieldValue::Number(2.5).canonical_string(), "2.5");
        assert_eq!(FieldValue::Boolean(true).canonical_string(), "true");
        assert_eq!(
            FieldValue::List(vec!["a".into(), 1.0.into()]).canonical_string(),
            "a,1"
        );
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(FieldValue::text(" 4.5 ").to_number(), Some(4.5));
        assert_eq!(FieldValue::text("bad").to_number(), None);
        assert_eq!(FieldValue::Number(f64::NAN).to_number(), None);
        assert_eq!(FieldValue::Boolean(true).to_number(), None);
    }

    #[test]
    fn converts_from_json() {
        let value: FieldValue = serde_json::json!({"A": {"x": "3"}, "n": 2}).into();
        assert_eq!(
            value.member("A").and_then(|a| a.member("x")),
            Some(&FieldValue::text("3"))
        );
        assert_eq!(value.member("n"), Some(&FieldValue::Number(2.0)));
    }

    #[test]
    fn msgpack_keeps_nested_records() {
        let value = FieldValue::record([
            ("work_time", FieldValue::text("08:00")),
            ("flags", FieldValue::List(vec![true.into(), FieldValue::Null])),
        ]);
        let bytes = value.to_msgpack().unwrap();
        assert_eq!(FieldValue::from_msgpack(&bytes).unwrap(), value);
    }

    #[test]
    fn emptiness() {
        assert!(FieldValue::text("  ").is_empty());
        assert!(FieldValue::List(vec![]).is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
        assert!(!FieldValue::Boolean(false).is_empty());
    }
}
