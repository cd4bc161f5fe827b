//! Property path accessors.
//!
//! The engine never inspects target objects directly; it reads key fields and
//! writes mapped values through a [`PropertyAccessor`]. Two backends ship with
//! the crate:
//!
//! - [`JsonAccessor`] for generic key-value targets (`serde_json::Value`),
//!   where a path is a key sequence and missing intermediates become `{}`.
//! - [`RecordAccessor`] for schema-typed [`Record`] targets, where a path is
//!   resolved ahead of time into field descriptors and missing intermediates
//!   are instantiated from their declared record type.
use crate::convert::TypeDescriptor;
use crate::error::AssemblyResult;
use crate::path::PropertyPath;
use serde_json::Value;

pub mod json;
pub mod record;

pub use json::{read_path, JsonAccessor};
pub use record::{FieldDescriptor, FieldValue, Record, RecordAccessor, RecordType, Schema};

/// Read and write values at (possibly nested) paths of a target object.
///
/// Implementations must keep each `set` atomic: either the whole path is
/// written or the target is left unchanged.
pub trait PropertyAccessor: Send + Sync {
    type Target;

    /// Read the value at `path`. Absent or null intermediates yield `None`.
    fn get(&self, root: &Self::Target, path: &PropertyPath) -> AssemblyResult<Option<Value>>;

    /// Write `value` at `path`, creating missing intermediate structure.
    fn set(&self, root: &mut Self::Target, path: &PropertyPath, value: Value)
        -> AssemblyResult<()>;

    /// Declared type of the field at `path`, used as the coercion target.
    fn declared_type(
        &self,
        _root: &Self::Target,
        _path: &PropertyPath,
    ) -> AssemblyResult<TypeDescriptor> {
        Ok(TypeDescriptor::Any)
    }
}
