//! Typed field column values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value stored in one column of one field item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Composite values, only storable through a serialized mapping
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Null and the empty string are skipped on save
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "String",
            FieldValue::Integer(_) => "Integer",
            FieldValue::Float(_) => "Float",
            FieldValue::Boolean(_) => "Boolean",
            FieldValue::Array(_) => "Array",
            FieldValue::Map(_) => "Map",
            FieldValue::Null => "Null",
        }
    }

    /// Lexical form written into a literal or resource term
    pub fn to_lexical(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Null => String::new(),
            FieldValue::Array(_) | FieldValue::Map(_) => self.to_json().to_string(),
        }
    }

    /// JSON form used by serialized mappings
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Array(arr) => Value::Array(arr.iter().map(|v| v.to_json()).collect()),
            FieldValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FieldValue::Null => Value::Null,
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(arr) => FieldValue::Array(arr.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "\"{}\"", s),
            FieldValue::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_lexical()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(arr: Vec<FieldValue>) -> Self {
        FieldValue::Array(arr)
    }
}

impl From<BTreeMap<String, FieldValue>> for FieldValue {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        FieldValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::from("").is_empty());
        assert!(!FieldValue::from(0).is_empty());
        assert!(!FieldValue::from(false).is_empty());
    }

    #[test]
    fn test_lexical_forms() {
        assert_eq!(FieldValue::from(42).to_lexical(), "42");
        assert_eq!(FieldValue::from(true).to_lexical(), "true");
        assert_eq!(FieldValue::from(1.5).to_lexical(), "1.5");
        assert_eq!(
            FieldValue::from(vec![FieldValue::from(1), FieldValue::from("a")]).to_lexical(),
            "[1,\"a\"]"
        );
    }

    #[test]
    fn test_json_conversion_preserves_nesting() {
        let mut map = BTreeMap::new();
        map.insert("width".to_string(), FieldValue::from(10));
        map.insert("tags".to_string(), FieldValue::from(vec![FieldValue::from("red")]));
        let value = FieldValue::Map(map);

        assert_eq!(FieldValue::from_json(value.to_json()), value);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::from("x").as_string(), Some("x"));
        assert_eq!(FieldValue::from(3).as_float(), Some(3.0));
        assert_eq!(FieldValue::from("x").as_integer(), None);
        assert_eq!(FieldValue::Null.type_name(), "Null");
    }
}
