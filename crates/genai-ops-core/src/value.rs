//! Dynamic values produced by expression evaluation.
//!
//! [`DynamicValue`] is a closed sum type. The [`DynamicValue::Unknown`]
//! variant marks a value that depends on something not yet resolved; a value
//! is *wholly known* when no `Unknown` appears anywhere inside it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Object members, ordered by key.
pub type ValueMap = BTreeMap<String, DynamicValue>;

/// A dynamically typed configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<DynamicValue>),
    Object(ValueMap),
    /// Depends on a reference that has not resolved (yet).
    Unknown,
}

impl DynamicValue {
    /// True iff the value contains no unresolved references.
    pub fn is_wholly_known(&self) -> bool {
        match self {
            DynamicValue::Unknown => false,
            DynamicValue::List(items) => items.iter().all(DynamicValue::is_wholly_known),
            DynamicValue::Object(members) => members.values().all(DynamicValue::is_wholly_known),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DynamicValue::Null => "null",
            DynamicValue::Bool(_) => "bool",
            DynamicValue::Number(_) => "number",
            DynamicValue::String(_) => "string",
            DynamicValue::List(_) => "list",
            DynamicValue::Object(_) => "object",
            DynamicValue::Unknown => "unknown",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            DynamicValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Object member lookup; `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_object().and_then(|members| members.get(key))
    }

    /// Render a primitive the way string templates do.
    ///
    /// Returns `None` for null, unknown and collection values.
    pub fn to_template_string(&self) -> Option<String> {
        match self {
            DynamicValue::String(s) => Some(s.clone()),
            DynamicValue::Number(n) => Some(format_number(*n)),
            DynamicValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Convert to JSON. `Unknown` becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DynamicValue::Null | DynamicValue::Unknown => serde_json::Value::Null,
            DynamicValue::Bool(b) => serde_json::Value::Bool(*b),
            DynamicValue::Number(n) => {
                if is_integral(*n) {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            DynamicValue::String(s) => serde_json::Value::String(s.clone()),
            DynamicValue::List(items) => {
                serde_json::Value::Array(items.iter().map(DynamicValue::to_json).collect())
            }
            DynamicValue::Object(members) => serde_json::Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        DynamicValue::String(s.into())
    }

    pub fn object<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, DynamicValue)>,
    {
        DynamicValue::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&serde_json::Value> for DynamicValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DynamicValue::Null,
            serde_json::Value::Bool(b) => DynamicValue::Bool(*b),
            serde_json::Value::Number(n) => DynamicValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => DynamicValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                DynamicValue::List(items.iter().map(DynamicValue::from).collect())
            }
            serde_json::Value::Object(members) => DynamicValue::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), DynamicValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<f64> for DynamicValue {
    fn from(n: f64) -> Self {
        DynamicValue::Number(n)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Number(n as f64)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl<T: Into<DynamicValue>> From<Vec<T>> for DynamicValue {
    fn from(items: Vec<T>) -> Self {
        DynamicValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Unknown => write!(f, "(unknown)"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

/// Format a number without a trailing `.0` for integral values.
pub(crate) fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
