//! Type converters
//!
//! Each host protocol has its own value shapes. A `TypeConverter` maps
//! semantic `Value`s to a protocol's `HostValue`s and back; the
//! `TypeConverterRegistry` finds the converter for an architecture.
//!
//! Two converters ship by default:
//!
//! - `LuaConverter` (peripheral host): every number is a float, lists are
//!   1-based tables.
//! - `ComponentConverter` (callback host): integers stay integers, lists are
//!   arrays, maps are string-keyed tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use hostbind_sdk::{HostValue, Value, ValueType, ARCH_COMPONENT, ARCH_PERIPHERAL};

use crate::error::ConvertError;

/// Conversion between semantic and host-native values for one protocol
pub trait TypeConverter: Send + Sync {
    /// Semantic value to host value
    fn to_host(&self, value: &Value) -> Result<HostValue, ConvertError>;

    /// Host value to a semantic value for a parameter declared as `ty`
    fn from_host(&self, value: &HostValue, ty: ValueType) -> Result<Value, ConvertError>;

    /// Convert a whole result list
    fn to_host_all(&self, values: &[Value]) -> Result<Vec<HostValue>, ConvertError> {
        values.iter().map(|v| self.to_host(v)).collect()
    }
}

// ============================================================================
// TypeConverterRegistry
// ============================================================================

/// Converters keyed by architecture identifier
pub struct TypeConverterRegistry {
    converters: DashMap<String, Arc<dyn TypeConverter>>,
}

impl TypeConverterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            converters: DashMap::new(),
        }
    }

    /// Registry with the peripheral and component converters installed
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(ARCH_PERIPHERAL, Arc::new(LuaConverter));
        registry.register(ARCH_COMPONENT, Arc::new(ComponentConverter));
        registry
    }

    /// Install or replace the converter for `architecture`
    pub fn register(&self, architecture: impl Into<String>, converter: Arc<dyn TypeConverter>) {
        self.converters.insert(architecture.into(), converter);
    }

    /// Converter for `architecture`
    pub fn get(&self, architecture: &str) -> Result<Arc<dyn TypeConverter>, ConvertError> {
        self.converters
            .get(architecture)
            .map(|c| c.clone())
            .ok_or_else(|| ConvertError::UnknownArchitecture(architecture.to_string()))
    }

    /// Check if a converter is installed
    pub fn contains(&self, architecture: &str) -> bool {
        self.converters.contains_key(architecture)
    }
}

impl Default for TypeConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn mismatch(expected: &str, value: &HostValue) -> ConvertError {
    ConvertError::Mismatch {
        expected: expected.to_string(),
        got: value.kind().to_string(),
    }
}

/// Integral float to integer, if it fits exactly
fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn number_from_host(n: f64, ty: ValueType) -> Result<Value, ConvertError> {
    match ty {
        ValueType::Integer => integral(n)
            .map(Value::Int)
            .ok_or_else(|| mismatch("integer", &HostValue::Number(n))),
        ValueType::Any => Ok(integral(n).map(Value::Int).unwrap_or(Value::Number(n))),
        _ => Ok(Value::Number(n)),
    }
}

fn table_key(key: &HostValue) -> Result<String, ConvertError> {
    match key {
        HostValue::String(s) => Ok(s.clone()),
        HostValue::Integer(i) => Ok(i.to_string()),
        HostValue::Number(n) => Ok(integral(*n).map(|i| i.to_string()).unwrap_or(n.to_string())),
        HostValue::Boolean(b) => Ok(b.to_string()),
        other => Err(ConvertError::UnsupportedKey(other.kind().to_string())),
    }
}

/// 1-based contiguous integer keys
fn sequence_position(key: &HostValue) -> Option<i64> {
    match key {
        HostValue::Integer(i) => Some(*i),
        HostValue::Number(n) => integral(*n),
        _ => None,
    }
}

fn table_from_host(
    converter: &dyn TypeConverter,
    entries: &[(HostValue, HostValue)],
) -> Result<Value, ConvertError> {
    let is_sequence = !entries.is_empty()
        && entries
            .iter()
            .enumerate()
            .all(|(i, (k, _))| sequence_position(k) == Some(i as i64 + 1));
    if is_sequence {
        let items = entries
            .iter()
            .map(|(_, v)| converter.from_host(v, ValueType::Any))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }

    let mut map = BTreeMap::new();
    for (k, v) in entries {
        map.insert(table_key(k)?, converter.from_host(v, ValueType::Any)?);
    }
    Ok(Value::Map(map))
}

fn scalar_from_host(value: &HostValue, ty: ValueType) -> Option<Result<Value, ConvertError>> {
    match value {
        HostValue::Nil => Some(Ok(Value::Null)),
        HostValue::Boolean(b) => Some(Ok(Value::Bool(*b))),
        HostValue::Integer(i) => Some(Ok(match ty {
            ValueType::Number => Value::Number(*i as f64),
            _ => Value::Int(*i),
        })),
        HostValue::Number(n) => Some(number_from_host(*n, ty)),
        HostValue::String(s) => Some(Ok(Value::String(s.clone()))),
        HostValue::Array(_) | HostValue::Table(_) => None,
    }
}

// ============================================================================
// LuaConverter
// ============================================================================

/// Converter for the peripheral host
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaConverter;

impl TypeConverter for LuaConverter {
    fn to_host(&self, value: &Value) -> Result<HostValue, ConvertError> {
        Ok(match value {
            Value::Null => HostValue::Nil,
            Value::Bool(b) => HostValue::Boolean(*b),
            Value::Int(i) => HostValue::Number(*i as f64),
            Value::Number(n) => HostValue::Number(*n),
            Value::String(s) => HostValue::String(s.clone()),
            Value::List(items) => HostValue::Table(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Ok((HostValue::Number((i + 1) as f64), self.to_host(v)?)))
                    .collect::<Result<_, ConvertError>>()?,
            ),
            Value::Map(map) => HostValue::Table(
                map.iter()
                    .map(|(k, v)| Ok((HostValue::String(k.clone()), self.to_host(v)?)))
                    .collect::<Result<_, ConvertError>>()?,
            ),
        })
    }

    fn from_host(&self, value: &HostValue, ty: ValueType) -> Result<Value, ConvertError> {
        if let Some(scalar) = scalar_from_host(value, ty) {
            return scalar;
        }
        match value {
            HostValue::Table(entries) => table_from_host(self, entries),
            HostValue::Array(items) => items
                .iter()
                .map(|v| self.from_host(v, ValueType::Any))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err(mismatch(ty.name(), value)),
        }
    }
}

// ============================================================================
// ComponentConverter
// ============================================================================

/// Converter for the callback host
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentConverter;

impl TypeConverter for ComponentConverter {
    fn to_host(&self, value: &Value) -> Result<HostValue, ConvertError> {
        Ok(match value {
            Value::Null => HostValue::Nil,
            Value::Bool(b) => HostValue::Boolean(*b),
            Value::Int(i) => HostValue::Integer(*i),
            Value::Number(n) => HostValue::Number(*n),
            Value::String(s) => HostValue::String(s.clone()),
            Value::List(items) => HostValue::Array(
                items
                    .iter()
                    .map(|v| self.to_host(v))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => HostValue::Table(
                map.iter()
                    .map(|(k, v)| Ok((HostValue::String(k.clone()), self.to_host(v)?)))
                    .collect::<Result<_, ConvertError>>()?,
            ),
        })
    }

    fn from_host(&self, value: &HostValue, ty: ValueType) -> Result<Value, ConvertError> {
        if let Some(scalar) = scalar_from_host(value, ty) {
            return scalar;
        }
        match value {
            HostValue::Array(items) => items
                .iter()
                .map(|v| self.from_host(v, ValueType::Any))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            HostValue::Table(entries) => table_from_host(self, entries),
            _ => Err(mismatch(ty.name(), value)),
        }
    }
}
