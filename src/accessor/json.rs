//! Key-value accessor over `serde_json::Value` objects.
use super::PropertyAccessor;
use crate::error::{AssemblyError, AssemblyResult};
use crate::path::PropertyPath;
use serde_json::{Map, Value};

/// Read a path from a JSON value without mutating it.
///
/// Source objects returned by containers are always read through this
/// function. A scalar blocking traversal is an error; absent or null values
/// along the way are not.
pub fn read_path<'a>(root: &'a Value, path: &PropertyPath) -> AssemblyResult<Option<&'a Value>> {
    let mut current = root;
    for (depth, segment) in path.segments().iter().enumerate() {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(Value::Null) | None => return Ok(None),
                Some(next) => current = next,
            },
            Value::Null => return Ok(None),
            other => {
                return Err(AssemblyError::path_resolution(
                    path,
                    format!(
                        "segment '{}' is a {} and cannot be traversed",
                        path.segments()[..depth].join("."),
                        kind_name(other)
                    ),
                ))
            }
        }
    }
    Ok(Some(current))
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accessor for generic key-value targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAccessor;

impl JsonAccessor {
    pub fn new() -> Self {
        Self
    }

    /// Walk the intermediates of `path` without mutating anything.
    fn check_writable(root: &Value, path: &PropertyPath) -> AssemblyResult<()> {
        let mut current = root;
        let intermediates = &path.segments()[..path.len() - 1];
        if !current.is_object() {
            return Err(AssemblyError::path_resolution(
                path,
                format!("target root is a {}, not an object", kind_name(current)),
            ));
        }
        for (depth, segment) in intermediates.iter().enumerate() {
            let next = current.as_object().and_then(|map| map.get(segment));
            match next {
                None | Some(Value::Null) => return Ok(()),
                Some(value) if value.is_object() => current = value,
                Some(other) => {
                    return Err(AssemblyError::path_resolution(
                        path,
                        format!(
                            "intermediate '{}' is a {} and cannot hold fields",
                            path.segments()[..=depth].join("."),
                            kind_name(other)
                        ),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl PropertyAccessor for JsonAccessor {
    type Target = Value;

    fn get(&self, root: &Value, path: &PropertyPath) -> AssemblyResult<Option<Value>> {
        Ok(read_path(root, path)?.cloned())
    }

    fn set(&self, root: &mut Value, path: &PropertyPath, value: Value) -> AssemblyResult<()> {
        Self::check_writable(root, path)?;
        let mut current = root;
        for segment in &path.segments()[..path.len() - 1] {
            let map = match current {
                Value::Object(map) => map,
                _ => return Err(AssemblyError::path_resolution(path, "lost object shape")),
            };
            let slot = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            current = slot;
        }
        match current {
            Value::Object(map) => {
                map.insert(path.last().to_string(), value);
                Ok(())
            }
            _ => Err(AssemblyError::path_resolution(path, "lost object shape")),
        }
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
