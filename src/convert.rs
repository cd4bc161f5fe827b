//! Type coercion applied to values before they are written to a target path.
//!
//! The engine only consults [`TypeConverter`]; richer conversion registries
//! plug in behind the same trait. [`DefaultConverter`] covers JSON scalars,
//! element-wise lists and record-shaped objects.
use crate::error::{AssemblyError, AssemblyResult};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Declared type of a target field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    Any,
    Bool,
    Integer,
    Float,
    String,
    List(Box<TypeDescriptor>),
    /// A structured record type, by schema name.
    Record(String),
}

impl TypeDescriptor {
    pub fn parse(text: &str) -> AssemblyResult<Self> {
        let text = text.trim();
        let parsed = match text {
            "any" => Self::Any,
            "bool" | "boolean" => Self::Bool,
            "int" | "integer" => Self::Integer,
            "float" | "number" => Self::Float,
            "string" => Self::String,
            _ => {
                if let Some(inner) = text
                    .strip_prefix("list<")
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    Self::List(Box::new(Self::parse(inner)?))
                } else if !text.is_empty()
                    && text
                        .chars()
                        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == ':')
                {
                    Self::Record(text.to_string())
                } else {
                    return Err(AssemblyError::Conversion {
                        value: format!("{text:?}"),
                        target: "type descriptor".to_string(),
                        reason: "unrecognized type syntax".to_string(),
                    });
                }
            }
        };
        Ok(parsed)
    }

    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::Record(name.into())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Record(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = AssemblyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeDescriptor> for String {
    fn from(ty: TypeDescriptor) -> Self {
        ty.to_string()
    }
}

/// Converts a value into the declared type of the destination field.
pub trait TypeConverter: Send + Sync {
    fn convert(&self, value: Value, target: &TypeDescriptor) -> AssemblyResult<Value>;
}

/// Conversions between JSON scalars, lists and objects.
///
/// `null` converts to `null` for every target type.
#[derive(Debug, Clone, Default)]
pub struct DefaultConverter {
    list_separator: Option<String>,
}

impl DefaultConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Separator used when a list is written to a string field (default `,`).
    pub fn with_list_separator(mut self, separator: impl Into<String>) -> Self {
        self.list_separator = Some(separator.into());
        self
    }

    fn separator(&self) -> &str {
        self.list_separator.as_deref().unwrap_or(",")
    }

    fn to_bool(&self, value: Value) -> AssemblyResult<Value> {
        match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(AssemblyError::conversion(&value, "bool", "only 0 and 1 map to bool")),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(AssemblyError::conversion(&value, "bool", "unrecognized boolean text")),
            },
            _ => Err(AssemblyError::conversion(&value, "bool", "not a scalar")),
        }
    }

    fn to_integer(&self, value: Value) -> AssemblyResult<Value> {
        match &value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Value::from(i));
                }
                match n.as_f64().and_then(whole_i64) {
                    Some(i) => Ok(Value::from(i)),
                    None => Err(AssemblyError::conversion(
                        &value,
                        "integer",
                        "number is fractional or out of range",
                    )),
                }
            }
            Value::String(s) => {
                let text = s.trim();
                if let Ok(parsed) = text.parse::<i64>() {
                    return Ok(Value::from(parsed));
                }
                match text.parse::<f64>().ok().and_then(whole_i64) {
                    Some(i) => Ok(Value::from(i)),
                    None => Err(AssemblyError::conversion(
                        &value,
                        "integer",
                        "not an integer literal in range",
                    )),
                }
            }
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            _ => Err(AssemblyError::conversion(&value, "integer", "not a scalar")),
        }
    }

    fn to_float(&self, value: Value) -> AssemblyResult<Value> {
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| AssemblyError::conversion(&value, "float", "not a finite number"))
    }

    fn to_string_value(&self, value: Value) -> AssemblyResult<Value> {
        match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match self.to_string_value(item)? {
                        Value::String(s) => parts.push(s),
                        Value::Null => {}
                        other => {
                            return Err(AssemblyError::conversion(
                                &other,
                                "string",
                                "list element is not a scalar",
                            ))
                        }
                    }
                }
                Ok(Value::String(parts.join(self.separator())))
            }
            Value::Null => Ok(Value::Null),
            Value::Object(_) => Err(AssemblyError::conversion(
                &value,
                "string",
                "objects have no string form",
            )),
        }
    }
}

impl TypeConverter for DefaultConverter {
    fn convert(&self, value: Value, target: &TypeDescriptor) -> AssemblyResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match target {
            TypeDescriptor::Any => Ok(value),
            TypeDescriptor::Bool => self.to_bool(value),
            TypeDescriptor::Integer => self.to_integer(value),
            TypeDescriptor::Float => self.to_float(value),
            TypeDescriptor::String => self.to_string_value(value),
            TypeDescriptor::List(element) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| self.convert(item, element))
                    .collect::<AssemblyResult<Vec<_>>>()
                    .map(Value::Array),
                single => Ok(Value::Array(vec![self.convert(single, element)?])),
            },
            TypeDescriptor::Record(name) => match value {
                Value::Object(_) => Ok(value),
                other => Err(AssemblyError::conversion(
                    &other,
                    name,
                    "record fields take objects",
                )),
            },
        }
    }
}

/// `f` as an `i64` when it is whole and representable.
fn whole_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod tests;
