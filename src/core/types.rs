//! Parameter values.
//!
//! Filter parameters are a closed set of scalar and array values. They are
//! written untagged so pipeline descriptions read naturally in JSON and TOML
//! (`"radius": 2`, `"size": [64, 64]`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A filter parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Array of values, e.g. a per-axis size
    Array(Vec<Value>),
    /// Absence of a value
    None,
}

/// Type of a parameter, used to check values before they reach a filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "inner")]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    /// Array with elements of a specific type
    Array(Box<ValueType>),
    /// Accepts any value
    Any,
}

// ============================================================================
// Value Implementation
// ============================================================================

impl Value {
    /// Get the type of this value.
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Array(arr) => match arr.first() {
                Some(first) => ValueType::Array(Box::new(first.get_type())),
                None => ValueType::Array(Box::new(ValueType::Any)),
            },
            Value::None => ValueType::Any,
        }
    }

    /// Try to get this value as an integer.
    ///
    /// Floats with no fractional part are accepted too, since JSON and TOML
    /// writers do not always preserve the distinction.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get this value as a float.
    /// Integers are automatically converted to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_string(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Try to get this value as an array reference.
    pub fn as_array(&self) -> Option<&[Value]> {
        if let Value::Array(arr) = self {
            Some(arr)
        } else {
            None
        }
    }

    /// Interpret an array as a list of integers.
    pub fn as_integer_list(&self) -> Option<Vec<i64>> {
        self.as_array()?.iter().map(Value::as_integer).collect()
    }

    /// Interpret an array as a list of floats.
    pub fn as_float_list(&self) -> Option<Vec<f64>> {
        self.as_array()?.iter().map(Value::as_float).collect()
    }

    /// Check if this value is None.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:.4}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::None => write!(f, "None"),
        }
    }
}

// ============================================================================
// ValueType Implementation
// ============================================================================

impl ValueType {
    /// Check if a value matches this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (ValueType::Boolean, Value::Boolean(_)) => true,
            (ValueType::Integer, v) => v.as_integer().is_some(),
            // Integer can be used where float is expected
            (ValueType::Float, Value::Float(_) | Value::Integer(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Array(inner), Value::Array(arr)) => arr.iter().all(|v| inner.matches(v)),
            _ => false,
        }
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> String {
        match self {
            ValueType::Boolean => "Boolean".to_string(),
            ValueType::Integer => "Integer".to_string(),
            ValueType::Float => "Float".to_string(),
            ValueType::String => "String".to_string(),
            ValueType::Array(inner) => format!("Array<{}>", inner.display_name()),
            ValueType::Any => "Any".to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_matching() {
        assert!(ValueType::Integer.matches(&Value::Integer(42)));
        assert!(ValueType::Float.matches(&Value::Integer(42)));
        assert!(ValueType::Integer.matches(&Value::Float(4.0)));
        assert!(!ValueType::Integer.matches(&Value::Float(3.5)));
        assert!(ValueType::Any.matches(&Value::String("test".to_string())));
        assert!(ValueType::Array(Box::new(ValueType::Integer))
            .matches(&Value::from(vec![1i64, 2, 3])));
        assert!(!ValueType::Array(Box::new(ValueType::Integer))
            .matches(&Value::from(vec!["a", "b"])));
    }

    #[test]
    fn test_untagged_json() {
        let v: Value = serde_json::from_str("[64, 32]").unwrap();
        assert_eq!(v.as_integer_list(), Some(vec![64, 32]));

        let v: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, Value::Float(2.5));

        let v: Value = serde_json::from_str("\"ramp\"").unwrap();
        assert_eq!(v.as_string(), Some("ramp"));

        assert_eq!(serde_json::to_string(&Value::Integer(3)).unwrap(), "3");
    }

    #[test]
    fn test_display() {
        let v = Value::from(vec![1i64, 2]);
        assert_eq!(v.to_string(), "[1, 2]");
        assert_eq!(v.get_type(), ValueType::Array(Box::new(ValueType::Integer)));
    }
}
