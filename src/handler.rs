//! Assembly operation handlers: key extraction and field writes.
//!
//! Handlers never call containers. The engine extracts keys from every
//! target, performs one lookup per container, and hands each target the
//! shared [`Lookup`] to apply.
use crate::accessor::PropertyAccessor;
use crate::container::{Key, KeyKind, Lookup, SourceData};
use crate::convert::TypeConverter;
use crate::engine::EngineOptions;
use crate::error::{AssemblyError, AssemblyResult};
use crate::path::PropertyPath;
use crate::plan::AssemblyOperation;
use crate::report::AssemblyReport;
use crate::rule::MappingStrategy;
use crate::splitter::KeySplitter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a key field maps to container data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// One key, at most one source object.
    #[default]
    OneToOne,
    /// Several keys (array or delimited string); values are aggregated.
    Batch,
}

/// What a batch does with keys the container has no data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    #[default]
    Drop,
    /// Keep the position with a `null`.
    Placeholder,
}

/// What a failed conversion does to the rest of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPolicy {
    /// Skip the field and record a warning.
    #[default]
    Skip,
    /// Stop the operation for that target and record an error.
    Abort,
}

/// Keys read from one target's key field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedKeys {
    pub keys: Vec<Key>,
    pub invalid: Vec<AssemblyError>,
}

/// Read the lookup keys of `operation` from a key field value.
///
/// Keys are typed by the operation's `key_type`, then by the container's
/// natural key kind, then kept as they are. An absent or null key field
/// yields no keys.
pub fn extract_keys(
    operation: &AssemblyOperation,
    raw: Option<&Value>,
    splitter: Option<&dyn KeySplitter>,
    natural: Option<KeyKind>,
) -> ExtractedKeys {
    let mut extracted = ExtractedKeys::default();
    let Some(raw) = raw.filter(|raw| !raw.is_null()) else {
        return extracted;
    };
    let mut push = |result: AssemblyResult<Key>| match result {
        Ok(key) => extracted.keys.push(key),
        Err(error) => extracted.invalid.push(error),
    };
    match (operation.handler, raw) {
        (HandlerKind::OneToOne, Value::Array(_) | Value::Object(_)) => push(Err(invalid_key(
            operation,
            raw,
            "one-to-one key must be a scalar",
        ))),
        (HandlerKind::OneToOne, scalar) => push(scalar_key(operation, scalar, natural)),
        (HandlerKind::Batch, Value::Array(items)) => {
            for item in items.iter().filter(|item| !item.is_null()) {
                push(scalar_key(operation, item, natural));
            }
        }
        (HandlerKind::Batch, Value::String(text)) => match splitter {
            Some(splitter) => {
                for token in splitter.split(text) {
                    push(token_key(operation, &token, natural));
                }
            }
            None => push(scalar_key(operation, raw, natural)),
        },
        (HandlerKind::Batch, Value::Object(_)) => push(Err(invalid_key(
            operation,
            raw,
            "batch key must be an array, a string or a scalar",
        ))),
        (HandlerKind::Batch, scalar) => push(scalar_key(operation, scalar, natural)),
    }
    extracted
}

fn invalid_key(operation: &AssemblyOperation, value: &Value, reason: impl Into<String>) -> AssemblyError {
    AssemblyError::InvalidKey {
        key_field: operation.key_field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn scalar_key(
    operation: &AssemblyOperation,
    value: &Value,
    natural: Option<KeyKind>,
) -> AssemblyResult<Key> {
    if value.is_array() || value.is_object() {
        return Err(invalid_key(operation, value, "key elements must be scalars"));
    }
    if let Some(kind) = operation.key_kind {
        return kind
            .coerce(value)
            .ok_or_else(|| invalid_key(operation, value, format!("not a valid {kind} key")));
    }
    if let Some(key) = natural.and_then(|kind| kind.coerce(value)) {
        return Ok(key);
    }
    Key::from_value(value).ok_or_else(|| invalid_key(operation, value, "key must be a scalar"))
}

fn token_key(
    operation: &AssemblyOperation,
    token: &str,
    natural: Option<KeyKind>,
) -> AssemblyResult<Key> {
    if let Some(kind) = operation.key_kind {
        return kind.parse_token(token).ok_or_else(|| {
            invalid_key(
                operation,
                &Value::String(token.to_string()),
                format!("not a valid {kind} key"),
            )
        });
    }
    Ok(natural
        .and_then(|kind| kind.parse_token(token))
        .unwrap_or_else(|| Key::Str(token.to_string())))
}

enum Flow {
    Continue,
    Stop,
}

/// Applies looked-up source data to targets through an accessor.
pub struct Applier<'a, A: PropertyAccessor> {
    pub accessor: &'a A,
    pub converter: &'a dyn TypeConverter,
    pub options: &'a EngineOptions,
}

impl<'a, A: PropertyAccessor> Applier<'a, A> {
    pub fn new(accessor: &'a A, converter: &'a dyn TypeConverter, options: &'a EngineOptions) -> Self {
        Self {
            accessor,
            converter,
            options,
        }
    }

    /// Apply `operation` to the target at `index` using its extracted `keys`.
    pub fn apply(
        &self,
        operation: &AssemblyOperation,
        target: &mut A::Target,
        index: usize,
        keys: &[Key],
        lookup: &Lookup,
        report: &mut AssemblyReport,
    ) {
        let label = operation.label();
        match operation.handler {
            HandlerKind::OneToOne => {
                self.apply_one_to_one(operation, &label, target, index, keys, lookup, report)
            }
            HandlerKind::Batch => {
                self.apply_batch(operation, &label, target, index, keys, lookup, report)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_one_to_one(
        &self,
        operation: &AssemblyOperation,
        label: &str,
        target: &mut A::Target,
        index: usize,
        keys: &[Key],
        lookup: &Lookup,
        report: &mut AssemblyReport,
    ) {
        let Some(key) = keys.first() else {
            return;
        };
        let source = match lookup.get(key) {
            None => {
                note_missing(operation, label, key, lookup, index, report);
                return;
            }
            Some(SourceData::One(source)) => source,
            Some(data @ SourceData::Many(_)) => {
                report.error(
                    AssemblyError::ShapeMismatch {
                        key_field: operation.key_field.to_string(),
                        expected: "a single object".to_string(),
                        found: data.shape().to_string(),
                    },
                    Some(index),
                    label,
                );
                return;
            }
        };
        let mut written = Vec::new();
        for rule in operation.rules.iter() {
            let value = match rule.read(source) {
                Ok(Some(value)) => value.clone(),
                Ok(None) => continue,
                Err(error) => {
                    report.warn(error, Some(index), label);
                    continue;
                }
            };
            let destination = rule.target(&operation.key_field);
            let flow = self.write(operation, label, target, index, destination, value, &mut written, report);
            if let Flow::Stop = flow {
                return;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_batch(
        &self,
        operation: &AssemblyOperation,
        label: &str,
        target: &mut A::Target,
        index: usize,
        keys: &[Key],
        lookup: &Lookup,
        report: &mut AssemblyReport,
    ) {
        let placeholder = self.options.missing_key == MissingKeyPolicy::Placeholder;
        let mut slots: Vec<Option<&Value>> = Vec::with_capacity(keys.len());
        let mut resolved = 0usize;
        for key in keys {
            match lookup.get(key) {
                Some(data) => {
                    for object in data.objects() {
                        slots.push(Some(object));
                        resolved += 1;
                    }
                }
                None => {
                    note_missing(operation, label, key, lookup, index, report);
                    if placeholder {
                        slots.push(None);
                    }
                }
            }
        }
        if resolved == 0 {
            return;
        }

        let mut written = Vec::new();
        for rule in operation.rules.iter() {
            let mut values = Vec::with_capacity(slots.len());
            for slot in &slots {
                let Some(object) = slot else {
                    values.push(Value::Null);
                    continue;
                };
                match rule.read(object) {
                    Ok(Some(value)) => values.push(value.clone()),
                    Ok(None) => {
                        if placeholder {
                            values.push(Value::Null);
                        }
                    }
                    Err(error) => {
                        report.warn(error, Some(index), label);
                        if placeholder {
                            values.push(Value::Null);
                        }
                    }
                }
            }
            let destination = rule.target(&operation.key_field);
            let value = Value::Array(values);
            let flow = self.write(operation, label, target, index, destination, value, &mut written, report);
            if let Flow::Stop = flow {
                return;
            }
        }
    }

    /// Coerce and write one value, honoring the operation's strategy.
    ///
    /// Rules arrive farthest scope first, so `written` holds the paths this
    /// operation already wrote for the current target. `KeepExisting` only
    /// guards values that were there before the operation ran.
    #[allow(clippy::too_many_arguments)]
    fn write<'p>(
        &self,
        operation: &AssemblyOperation,
        label: &str,
        target: &mut A::Target,
        index: usize,
        destination: &'p PropertyPath,
        value: Value,
        written: &mut Vec<&'p PropertyPath>,
        report: &mut AssemblyReport,
    ) -> Flow {
        let declared = match self.accessor.declared_type(target, destination) {
            Ok(declared) => declared,
            Err(error) => {
                report.warn(error, Some(index), label);
                return Flow::Continue;
            }
        };
        let value = match self.converter.convert(value, &declared) {
            Ok(value) => value,
            Err(error) => {
                return match self.options.conversion {
                    ConversionPolicy::Skip => {
                        report.warn(error, Some(index), label);
                        Flow::Continue
                    }
                    ConversionPolicy::Abort => {
                        report.error(error, Some(index), label);
                        Flow::Stop
                    }
                };
            }
        };
        if operation.strategy != MappingStrategy::Overwrite {
            let existing = if written.contains(&destination) {
                None
            } else {
                self.accessor.get(target, destination).ok().flatten()
            };
            if !operation.strategy.should_write(existing.as_ref(), &value) {
                return Flow::Continue;
            }
        }
        match self.accessor.set(target, destination, value) {
            Ok(()) => {
                report.writes += 1;
                if !written.contains(&destination) {
                    written.push(destination);
                }
            }
            Err(error) => report.warn(error, Some(index), label),
        }
        Flow::Continue
    }
}

fn note_missing(
    operation: &AssemblyOperation,
    label: &str,
    key: &Key,
    lookup: &Lookup,
    index: usize,
    report: &mut AssemblyReport,
) {
    if let Some(reason) = lookup.failure(key) {
        report.warn(
            AssemblyError::ContainerLookup {
                container: operation.container.clone(),
                key: Some(key.to_string()),
                reason: reason.to_string(),
            },
            Some(index),
            label,
        );
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
