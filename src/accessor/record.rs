//! Structured, schema-typed records and their accessor.
//!
//! A [`Record`] carries its [`RecordType`], so every path can be resolved
//! into a chain of field descriptors before anything is read or written.
//! Resolved chains are cached per `(record type, path)`. Only records whose
//! type is the schema's own registration are accepted.
use super::json::kind_name;
use super::PropertyAccessor;
use crate::convert::TypeDescriptor;
use crate::error::{AssemblyError, AssemblyResult};
use crate::path::PropertyPath;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// Declared shape of a record: ordered fields plus an instantiability flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Abstract types can be read through but never default-constructed.
    pub is_abstract: bool,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

/// Registry of record types addressable by name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, Arc<RecordType>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, ty: RecordType) -> Self {
        self.register(ty);
        self
    }

    pub fn register(&mut self, ty: RecordType) -> Arc<RecordType> {
        let ty = Arc::new(ty);
        self.types.insert(ty.name.clone(), Arc::clone(&ty));
        ty
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordType>> {
        self.types.get(name)
    }

    /// Create an empty record of the named type.
    pub fn instantiate(&self, name: &str) -> AssemblyResult<Record> {
        let ty = self.get(name).ok_or_else(|| {
            AssemblyError::path_resolution(name, format!("unknown record type '{name}'"))
        })?;
        if ty.is_abstract {
            return Err(AssemblyError::path_resolution(
                name,
                format!("record type '{name}' is abstract and cannot be instantiated"),
            ));
        }
        Ok(Record::new(Arc::clone(ty)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unset,
    Value(Value),
    Record(Box<Record>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(ty: Arc<RecordType>) -> Self {
        let values = vec![FieldValue::Unset; ty.fields.len()];
        Self { ty, values }
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.ty.index_of(name).map(|index| &self.values[index])
    }

    /// Scalar or list value of a field, if set.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.field(name)? {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn nested(&self, name: &str) -> Option<&Record> {
        match self.field(name)? {
            FieldValue::Record(record) => Some(&**record),
            _ => None,
        }
    }

    /// Set a non-record field directly, without path resolution.
    pub fn set_value(&mut self, name: &str, value: Value) -> AssemblyResult<()> {
        let index = self.ty.index_of(name).ok_or_else(|| {
            AssemblyError::path_resolution(
                name,
                format!("record type '{}' has no field '{name}'", self.ty.name),
            )
        })?;
        if let TypeDescriptor::Record(_) = self.ty.fields[index].ty {
            return Err(AssemblyError::path_resolution(
                name,
                "record-typed fields are set through RecordAccessor",
            ));
        }
        self.values[index] = FieldValue::Value(value);
        Ok(())
    }

    /// JSON view of the fields that are set.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (field, value) in self.ty.fields.iter().zip(&self.values) {
            match value {
                FieldValue::Unset => {}
                FieldValue::Value(value) => {
                    map.insert(field.name.clone(), value.clone());
                }
                FieldValue::Record(record) => {
                    map.insert(field.name.clone(), record.to_value());
                }
            }
        }
        Value::Object(map)
    }

    /// Materialize an object as a record of type `ty`, nesting as declared.
    pub fn from_value(schema: &Schema, ty: &Arc<RecordType>, value: &Value) -> AssemblyResult<Self> {
        if ty.is_abstract {
            return Err(AssemblyError::path_resolution(
                &ty.name,
                format!("record type '{}' is abstract and cannot be instantiated", ty.name),
            ));
        }
        let Value::Object(map) = value else {
            return Err(AssemblyError::path_resolution(
                &ty.name,
                format!("expected an object for '{}', got {}", ty.name, kind_name(value)),
            ));
        };
        let mut record = Record::new(Arc::clone(ty));
        for (name, field_value) in map {
            let index = ty.index_of(name).ok_or_else(|| {
                AssemblyError::path_resolution(
                    name,
                    format!("record type '{}' has no field '{name}'", ty.name),
                )
            })?;
            record.values[index] = match (&ty.fields[index].ty, field_value) {
                (_, Value::Null) => FieldValue::Value(Value::Null),
                (TypeDescriptor::Record(nested), nested_value) => {
                    let nested_ty = schema.get(nested).ok_or_else(|| {
                        AssemblyError::path_resolution(
                            name,
                            format!("unknown record type '{nested}'"),
                        )
                    })?;
                    FieldValue::Record(Box::new(Record::from_value(
                        schema,
                        nested_ty,
                        nested_value,
                    )?))
                }
                (_, other) => FieldValue::Value(other.clone()),
            };
        }
        Ok(record)
    }
}

#[derive(Debug)]
struct ResolvedStep {
    index: usize,
    ty: TypeDescriptor,
    /// Record type of the field, when it is record-typed and registered.
    record: Option<Arc<RecordType>>,
}

type ResolvedPath = Arc<[ResolvedStep]>;

/// Accessor for [`Record`] targets backed by a [`Schema`].
#[derive(Debug)]
pub struct RecordAccessor {
    schema: Arc<Schema>,
    resolved: RwLock<HashMap<(String, PropertyPath), ResolvedPath>>,
}

impl RecordAccessor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn resolve(&self, root: &Arc<RecordType>, path: &PropertyPath) -> AssemblyResult<ResolvedPath> {
        match self.schema.get(&root.name) {
            Some(registered) if Arc::ptr_eq(registered, root) => {}
            _ => {
                return Err(AssemblyError::path_resolution(
                    path,
                    format!("record type '{}' is not registered in this schema", root.name),
                ))
            }
        }
        let cache_key = (root.name.clone(), path.clone());
        {
            let cache = self
                .resolved
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(steps) = cache.get(&cache_key) {
                return Ok(Arc::clone(steps));
            }
        }

        let mut steps = Vec::with_capacity(path.len());
        let mut current = Arc::clone(root);
        let last = path.len() - 1;
        for (depth, segment) in path.segments().iter().enumerate() {
            let index = current.index_of(segment).ok_or_else(|| {
                AssemblyError::path_resolution(
                    path,
                    format!("record type '{}' has no field '{segment}'", current.name),
                )
            })?;
            let ty = current.fields[index].ty.clone();
            let record = match &ty {
                TypeDescriptor::Record(name) => self.schema.get(name).cloned(),
                _ => None,
            };
            let next = record.clone();
            steps.push(ResolvedStep { index, ty, record });
            if depth == last {
                break;
            }
            match next {
                Some(next) => current = next,
                None => {
                    return Err(AssemblyError::path_resolution(
                        path,
                        format!(
                            "field '{segment}' is declared {} and cannot hold nested fields",
                            current.fields[index].ty
                        ),
                    ))
                }
            }
        }

        let resolved: ResolvedPath = steps.into();
        self.resolved
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(cache_key, Arc::clone(&resolved));
        Ok(resolved)
    }

    fn prepare_final(
        &self,
        step: &ResolvedStep,
        path: &PropertyPath,
        value: Value,
    ) -> AssemblyResult<FieldValue> {
        match (&step.ty, value) {
            (_, Value::Null) => Ok(FieldValue::Value(Value::Null)),
            (TypeDescriptor::Record(name), value) => {
                let ty = step.record.as_ref().ok_or_else(|| {
                    AssemblyError::path_resolution(path, format!("unknown record type '{name}'"))
                })?;
                let record = Record::from_value(&self.schema, ty, &value).map_err(|err| {
                    AssemblyError::path_resolution(path, err.to_string())
                })?;
                Ok(FieldValue::Record(Box::new(record)))
            }
            (_, value) => Ok(FieldValue::Value(value)),
        }
    }
}

impl PropertyAccessor for RecordAccessor {
    type Target = Record;

    fn get(&self, root: &Record, path: &PropertyPath) -> AssemblyResult<Option<Value>> {
        let steps = self.resolve(&root.ty, path)?;
        let Some((last, intermediates)) = steps.split_last() else {
            return Ok(None);
        };
        let mut current = root;
        for step in intermediates {
            match slot(current, step, path)? {
                FieldValue::Record(record) => current = nested(record, step, path)?,
                FieldValue::Unset | FieldValue::Value(Value::Null) => return Ok(None),
                FieldValue::Value(other) => {
                    return Err(AssemblyError::path_resolution(
                        path,
                        format!("record field holds a {}", kind_name(other)),
                    ))
                }
            }
        }
        Ok(match slot(current, last, path)? {
            FieldValue::Unset | FieldValue::Value(Value::Null) => None,
            FieldValue::Value(value) => Some(value.clone()),
            FieldValue::Record(record) => Some(record.to_value()),
        })
    }

    fn set(&self, root: &mut Record, path: &PropertyPath, value: Value) -> AssemblyResult<()> {
        let steps = self.resolve(&root.ty, path)?;
        let Some((last, intermediates)) = steps.split_last() else {
            return Ok(());
        };

        // Validate the whole chain before touching the target.
        let mut existing: Option<&Record> = Some(&*root);
        for step in intermediates {
            let field = existing.map(|record| slot(record, step, path)).transpose()?;
            match field {
                Some(FieldValue::Record(record)) => existing = Some(nested(record, step, path)?),
                Some(FieldValue::Value(other)) if !other.is_null() => {
                    return Err(AssemblyError::path_resolution(
                        path,
                        format!("record field holds a {}", kind_name(other)),
                    ))
                }
                _ => {
                    let ty = step.record.as_ref().ok_or_else(|| {
                        AssemblyError::path_resolution(path, "missing record type")
                    })?;
                    if ty.is_abstract {
                        return Err(AssemblyError::path_resolution(
                            path,
                            format!(
                                "record type '{}' is abstract and cannot be instantiated",
                                ty.name
                            ),
                        ));
                    }
                    existing = None;
                }
            }
        }
        if let Some(record) = existing {
            slot(record, last, path)?;
        }
        let prepared = self.prepare_final(last, path, value)?;

        let mut current = root;
        for step in intermediates {
            let slot = current
                .values
                .get_mut(step.index)
                .ok_or_else(|| layout_mismatch(path))?;
            if !matches!(slot, FieldValue::Record(_)) {
                let ty = step.record.clone().ok_or_else(|| {
                    AssemblyError::path_resolution(path, "missing record type")
                })?;
                *slot = FieldValue::Record(Box::new(Record::new(ty)));
            }
            current = match slot {
                FieldValue::Record(record) => &mut **record,
                _ => return Err(AssemblyError::path_resolution(path, "lost record shape")),
            };
        }
        let slot = current
            .values
            .get_mut(last.index)
            .ok_or_else(|| layout_mismatch(path))?;
        *slot = prepared;
        Ok(())
    }

    fn declared_type(&self, root: &Record, path: &PropertyPath) -> AssemblyResult<TypeDescriptor> {
        let steps = self.resolve(&root.ty, path)?;
        Ok(steps
            .last()
            .map(|step| step.ty.clone())
            .unwrap_or(TypeDescriptor::Any))
    }
}

fn layout_mismatch(path: &PropertyPath) -> AssemblyError {
    AssemblyError::path_resolution(path, "record does not match its schema layout")
}

fn slot<'r>(
    record: &'r Record,
    step: &ResolvedStep,
    path: &PropertyPath,
) -> AssemblyResult<&'r FieldValue> {
    record
        .values
        .get(step.index)
        .ok_or_else(|| layout_mismatch(path))
}

/// A nested record must carry the schema's type for its field.
fn nested<'r>(record: &'r Record, step: &ResolvedStep, path: &PropertyPath) -> AssemblyResult<&'r Record> {
    match &step.record {
        Some(ty) if Arc::ptr_eq(ty, &record.ty) => Ok(record),
        _ => Err(layout_mismatch(path)),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
