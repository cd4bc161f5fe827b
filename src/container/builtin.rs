//! Ready-made containers: constant maps, closures and fetch-and-group sources.
use super::{Container, Key, KeyKind, Lookup, SourceData};
use crate::accessor::read_path;
use crate::path::PropertyPath;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Fixed key -> data map, e.g. dictionaries and enumerations.
#[derive(Debug, Clone)]
pub struct ConstantContainer {
    namespace: String,
    data: HashMap<Key, SourceData>,
}

impl ConstantContainer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            data: HashMap::new(),
        }
    }

    /// Add an entry; arrays are stored as several source objects for the key.
    pub fn with(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.data.insert(key.into(), SourceData::from_value(value));
        self
    }

    /// Add an entry whose value is one source object, even when it is an array.
    pub fn with_one(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.data.insert(key.into(), SourceData::One(value));
        self
    }

    pub fn from_entries<K, I>(namespace: impl Into<String>, entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        entries
            .into_iter()
            .fold(Self::new(namespace), |container, (key, value)| {
                container.with(key, value)
            })
    }

    /// Build from a JSON object; keys that parse as integers become integer keys.
    ///
    /// Array values follow [`ConstantContainer::with`] and become many-to-many
    /// entries, which one-to-one operations reject as a shape mismatch.
    pub fn from_json(namespace: impl Into<String>, value: &Value) -> Result<Self> {
        let namespace = namespace.into();
        let map = value
            .as_object()
            .ok_or_else(|| anyhow!("container '{namespace}' data must be a JSON object"))?;
        let mut container = Self::new(namespace);
        for (raw_key, entry) in map {
            let key = match raw_key.trim().parse::<i64>() {
                Ok(int) => Key::Int(int),
                Err(_) => Key::Str(raw_key.clone()),
            };
            container = container.with(key, entry.clone());
        }
        Ok(container)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Container for ConstantContainer {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn lookup(&self, keys: &BTreeSet<Key>) -> Result<Lookup> {
        let mut lookup = Lookup::new();
        for key in keys {
            if let Some(data) = self.data.get(key) {
                lookup.insert(key.clone(), data.clone());
            }
        }
        Ok(lookup)
    }

    fn key_kind(&self) -> Option<KeyKind> {
        let mut kinds = self.data.keys().map(Key::kind);
        let first = kinds.next()?;
        kinds.all(|kind| kind == first).then_some(first)
    }
}

type LookupFn = dyn Fn(&BTreeSet<Key>) -> Result<Lookup> + Send + Sync;

/// Container backed by a closure.
pub struct LambdaContainer {
    namespace: String,
    key_kind: Option<KeyKind>,
    lookup: Box<LookupFn>,
}

impl LambdaContainer {
    pub fn new<F>(namespace: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&BTreeSet<Key>) -> Result<Lookup> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            key_kind: None,
            lookup: Box::new(lookup),
        }
    }

    pub fn with_key_kind(mut self, kind: KeyKind) -> Self {
        self.key_kind = Some(kind);
        self
    }
}

impl fmt::Debug for LambdaContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaContainer")
            .field("namespace", &self.namespace)
            .field("key_kind", &self.key_kind)
            .finish_non_exhaustive()
    }
}

impl Container for LambdaContainer {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn lookup(&self, keys: &BTreeSet<Key>) -> Result<Lookup> {
        (self.lookup)(keys)
    }

    fn key_kind(&self) -> Option<KeyKind> {
        self.key_kind
    }
}

/// How a [`FetchContainer`] turns fetched objects into per-key data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    /// Group by the key property; the first object per key wins.
    #[default]
    OneToOne,
    /// Group by the key property; every object per key is kept.
    OneToMany,
    /// The fetch already returns objects keyed by lookup key.
    Mapped,
}

type FetchFn = dyn Fn(&[Key]) -> Result<Vec<Value>> + Send + Sync;

/// Container over a batch query returning a flat list of objects.
///
/// The key of each fetched object is read from `key_property`, so a query
/// like `select * from users where id in (...)` can back a container
/// directly.
pub struct FetchContainer {
    namespace: String,
    key_property: Option<PropertyPath>,
    mapping: MappingType,
    key_kind: Option<KeyKind>,
    fetch: Box<FetchFn>,
}

impl FetchContainer {
    /// Group fetched objects by `key_property` using `mapping`.
    pub fn grouped<F>(
        namespace: impl Into<String>,
        key_property: PropertyPath,
        mapping: MappingType,
        fetch: F,
    ) -> Self
    where
        F: Fn(&[Key]) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            key_property: Some(key_property),
            mapping,
            key_kind: None,
            fetch: Box::new(fetch),
        }
    }

    /// The fetch returns JSON objects whose own keys are the lookup keys.
    pub fn mapped<F>(namespace: impl Into<String>, fetch: F) -> Self
    where
        F: Fn(&[Key]) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            key_property: None,
            mapping: MappingType::Mapped,
            key_kind: None,
            fetch: Box::new(fetch),
        }
    }

    pub fn with_key_kind(mut self, kind: KeyKind) -> Self {
        self.key_kind = Some(kind);
        self
    }

    fn key_of(&self, raw: &Value) -> Option<Key> {
        match self.key_kind {
            Some(kind) => kind.coerce(raw),
            None => Key::from_value(raw),
        }
    }

    fn group(&self, keys: &BTreeSet<Key>, objects: Vec<Value>) -> Result<Lookup> {
        let key_property = self
            .key_property
            .as_ref()
            .ok_or_else(|| anyhow!("container '{}' has no key property", self.namespace))?;
        let mut grouped: HashMap<Key, Vec<Value>> = HashMap::new();
        for object in objects {
            let raw = read_path(&object, key_property)
                .with_context(|| format!("read key property '{key_property}'"))?;
            let Some(key) = raw.and_then(|raw| self.key_of(raw)) else {
                tracing::debug!(
                    container = %self.namespace,
                    key_property = %key_property,
                    "fetched object has no usable key"
                );
                continue;
            };
            if keys.contains(&key) {
                grouped.entry(key).or_default().push(object);
            }
        }
        let mut lookup = Lookup::new();
        for (key, mut objects) in grouped {
            let data = match self.mapping {
                MappingType::OneToMany => SourceData::Many(objects),
                _ => SourceData::One(objects.swap_remove(0)),
            };
            lookup.insert(key, data);
        }
        Ok(lookup)
    }

    fn unpack_mapped(&self, keys: &BTreeSet<Key>, objects: Vec<Value>) -> Result<Lookup> {
        let mut lookup = Lookup::new();
        for object in objects {
            let Value::Object(map) = object else {
                return Err(anyhow!(
                    "container '{}' mapped fetch must return objects",
                    self.namespace
                ));
            };
            for (raw_key, data) in map {
                let key = match self.key_kind {
                    Some(kind) => kind.parse_token(&raw_key),
                    None => Some(match raw_key.parse::<i64>() {
                        Ok(int) => Key::Int(int),
                        Err(_) => Key::Str(raw_key),
                    }),
                };
                if let Some(key) = key.filter(|key| keys.contains(key)) {
                    lookup.insert(key, SourceData::from_value(data));
                }
            }
        }
        Ok(lookup)
    }
}

impl fmt::Debug for FetchContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContainer")
            .field("namespace", &self.namespace)
            .field("key_property", &self.key_property)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl Container for FetchContainer {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn lookup(&self, keys: &BTreeSet<Key>) -> Result<Lookup> {
        let requested: Vec<Key> = keys.iter().cloned().collect();
        let objects = (self.fetch)(&requested)
            .with_context(|| format!("fetch for container '{}'", self.namespace))?;
        match self.mapping {
            MappingType::Mapped => self.unpack_mapped(keys, objects),
            MappingType::OneToOne | MappingType::OneToMany => self.group(keys, objects),
        }
    }

    fn key_kind(&self) -> Option<KeyKind> {
        self.key_kind
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
