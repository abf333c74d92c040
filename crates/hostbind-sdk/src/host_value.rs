//! Host-native value shapes
//!
//! Hosts exchange `HostValue`s with the engine. The set of variants is the
//! union of what the supported protocols can carry; each protocol's type
//! converter decides which variants it emits (e.g. a Lua-style host never
//! produces `Integer` or `Array`, it uses `Number` and 1-based `Table`s).

use std::fmt;

/// Raw value as seen by a host protocol.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    /// Host nil/null
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// Integer (hosts with a distinct integer type)
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// String
    String(String),
    /// Ordered array (hosts with a native array type)
    Array(Vec<HostValue>),
    /// Key/value table in insertion order
    Table(Vec<(HostValue, HostValue)>),
}

impl HostValue {
    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) => "integer",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Array(_) => "array",
            HostValue::Table(_) => "table",
        }
    }

    /// Check if this is `Nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "nil"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Integer(i) => write!(f, "{}", i),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::Array(items) => write!(f, "array({})", items.len()),
            HostValue::Table(entries) => write!(f, "table({})", entries.len()),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Number(f)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Integer(i)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}
