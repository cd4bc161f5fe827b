//! Container contract: named lookup sources mapping keys to source objects.
//!
//! Containers are the only place the engine may block. They own their data;
//! the engine reads what they return and never mutates it.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

pub mod builtin;
pub mod registry;

pub use builtin::{ConstantContainer, FetchContainer, LambdaContainer, MappingType};
pub use registry::{ContainerProvider, ContainerRegistry};

/// Lookup key extracted from a target's key field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

/// Natural type of a container's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Integer,
    String,
}

impl Key {
    /// Key for a JSON scalar, keeping its natural type.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Key::Int(i)),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Some(Key::Int(f as i64))
                    }
                    _ => Some(Key::Str(n.to_string())),
                },
            },
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Bool(b) => Some(Key::Str(b.to_string())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(i) => Value::from(*i),
            Key::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Int(_) => KeyKind::Integer,
            Key::Str(_) => KeyKind::String,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl KeyKind {
    /// Coerce a JSON scalar into a key of this kind.
    pub fn coerce(self, value: &Value) -> Option<Key> {
        match (self, value) {
            (KeyKind::String, Value::String(s)) => Some(Key::Str(s.clone())),
            (KeyKind::String, Value::Number(n)) => Some(Key::Str(n.to_string())),
            (KeyKind::String, Value::Bool(b)) => Some(Key::Str(b.to_string())),
            (KeyKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Key::Int),
            (KeyKind::Integer, Value::Number(_)) => match Key::from_value(value)? {
                key @ Key::Int(_) => Some(key),
                Key::Str(_) => None,
            },
            _ => None,
        }
    }

    /// Type a raw token produced by a key splitter.
    pub fn parse_token(self, token: &str) -> Option<Key> {
        match self {
            KeyKind::String => Some(Key::Str(token.to_string())),
            KeyKind::Integer => token.trim().parse::<i64>().ok().map(Key::Int),
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Integer => f.write_str("integer"),
            KeyKind::String => f.write_str("string"),
        }
    }
}

/// Data a container holds for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    One(Value),
    /// Several source objects for one key (many-to-many).
    Many(Vec<Value>),
}

impl SourceData {
    /// Arrays become `Many`; everything else is a single source object.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => SourceData::Many(items),
            other => SourceData::One(other),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            SourceData::One(_) => "a single object",
            SourceData::Many(_) => "a collection",
        }
    }

    pub fn objects(&self) -> &[Value] {
        match self {
            SourceData::One(value) => std::slice::from_ref(value),
            SourceData::Many(values) => values,
        }
    }
}

/// Result of one container call.
///
/// Keys missing from both maps are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    pub found: HashMap<Key, SourceData>,
    /// Per-key failures the container could distinguish from absence.
    pub failures: BTreeMap<Key, String>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, data: SourceData) {
        self.found.insert(key, data);
    }

    pub fn fail(&mut self, key: Key, reason: impl Into<String>) {
        self.failures.insert(key, reason.into());
    }

    pub fn get(&self, key: &Key) -> Option<&SourceData> {
        self.found.get(key)
    }

    pub fn failure(&self, key: &Key) -> Option<&str> {
        self.failures.get(key).map(String::as_str)
    }
}

/// A named lookup source.
pub trait Container: Send + Sync {
    fn namespace(&self) -> &str;

    /// Fetch data for every key it has; omit keys it does not.
    fn lookup(&self, keys: &BTreeSet<Key>) -> anyhow::Result<Lookup>;

    /// Natural key type, used to type tokens split from delimited key strings.
    fn key_kind(&self) -> Option<KeyKind> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_from_value_keeps_natural_type() {
        assert_eq!(Key::from_value(&json!(3)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!(3.0)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!("3")), Some(Key::from("3")));
        assert_eq!(Key::from_value(&json!({"id": 3})), None);
        assert_eq!(Key::from_value(&Value::Null), None);
    }

    #[test]
    fn key_kind_coerces_between_text_and_integers() {
        assert_eq!(KeyKind::Integer.coerce(&json!(" 12 ")), Some(Key::Int(12)));
        assert_eq!(KeyKind::Integer.coerce(&json!("x")), None);
        assert_eq!(KeyKind::Integer.coerce(&json!(1.5)), None);
        assert_eq!(KeyKind::String.coerce(&json!(12)), Some(Key::from("12")));
        assert_eq!(KeyKind::Integer.parse_token("7"), Some(Key::Int(7)));
        assert_eq!(KeyKind::String.parse_token("7"), Some(Key::from("7")));
    }

    #[test]
    fn source_data_from_value_splits_on_arrays() {
        assert_eq!(
            SourceData::from_value(json!([{"a": 1}, {"a": 2}])).objects().len(),
            2
        );
        assert_eq!(
            SourceData::from_value(json!({"a": 1})),
            SourceData::One(json!({"a": 1}))
        );
    }
}
