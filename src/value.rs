//! Scalar values and the scalar-or-list wrapper stored by wildcards.
//!
//! Both enums are serde-untagged so persisted documents stay plain JSON:
//! `1` round-trips as an integer, `1.5` as a float, `["a", "b"]` as a list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive kind a wildcard policy may declare for its values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Str,
}

impl ValueKind {
    /// Name used in policy sidecars and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "str",
        }
    }

    /// Whether values of this kind can be compared against numeric bounds.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed value element.
///
/// Untagged variant order matters: `true` parses as `Bool`, `1` as `Int`,
/// `1.5` as `Float`, everything else as `Str`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean element.
    Bool(bool),
    /// Integer element.
    Int(i64),
    /// Float element.
    Float(f64),
    /// String element.
    Str(String),
}

impl Scalar {
    /// The primitive kind of this element.
    pub fn kind(&self) -> ValueKind {
        match self {
            Scalar::Bool(_) => ValueKind::Bool,
            Scalar::Int(_) => ValueKind::Int,
            Scalar::Float(_) => ValueKind::Float,
            Scalar::Str(_) => ValueKind::Str,
        }
    }

    /// Numeric view used for bound checks; `None` for bools and strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// String view without quoting, as used in filenames and queries.
    pub fn render(&self) -> String {
        match self {
            Scalar::Bool(value) => value.to_string(),
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Str(value) => value.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// A wildcard's stored value: one scalar or an ordered list of scalars.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Ordered list of elements.
    Many(Vec<Scalar>),
    /// Single element.
    One(Scalar),
}

impl Value {
    /// View the value as a slice of elements.
    pub fn elements(&self) -> &[Scalar] {
        match self {
            Value::One(scalar) => std::slice::from_ref(scalar),
            Value::Many(items) => items,
        }
    }

    /// Number of elements held.
    pub fn len(&self) -> usize {
        self.elements().len()
    }

    /// Whether the value holds no elements (only possible for a list).
    pub fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }

    /// String renderings of every element, in order.
    pub fn render_all(&self) -> Vec<String> {
        self.elements().iter().map(Scalar::render).collect()
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::One(scalar)
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(items: Vec<Scalar>) -> Self {
        Value::Many(items)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::One(Scalar::from(value))
    }
}
