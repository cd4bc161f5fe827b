//! Error taxonomy for plan construction and assembly runs.
//!
//! Every variant is recoverable at some level: field writes, per-key lookups
//! and operation setup each degrade locally and surface through the
//! [`AssemblyReport`](crate::report::AssemblyReport) instead of aborting a
//! batch.
use thiserror::Error;

pub type AssemblyResult<T> = std::result::Result<T, AssemblyError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// A property path could not be parsed.
    #[error("invalid property path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path could not be traversed or written on a concrete object.
    #[error("cannot resolve path '{path}': {reason}")]
    PathResolution { path: String, reason: String },

    /// Template references form a cycle.
    #[error("template cycle detected: {}", cycle.join(" -> "))]
    TemplateCycle { cycle: Vec<String> },

    #[error("unknown template '{name}' referenced from {scope}")]
    UnknownTemplate { name: String, scope: String },

    /// No registered converter could produce the declared type.
    #[error("cannot convert {value} to {target}: {reason}")]
    Conversion {
        value: String,
        target: String,
        reason: String,
    },

    /// A container failed, either for a single key or for the whole lookup.
    #[error("container '{container}' lookup failed{}: {reason}", key_suffix(key.as_deref()))]
    ContainerLookup {
        container: String,
        key: Option<String>,
        reason: String,
    },

    #[error("no container registered for namespace '{0}'")]
    UnknownContainer(String),

    /// The container result shape does not match the declared handler kind.
    #[error("operation on '{key_field}' expects {expected} data but container returned {found}")]
    ShapeMismatch {
        key_field: String,
        expected: String,
        found: String,
    },

    #[error("invalid key {value} at '{key_field}': {reason}")]
    InvalidKey {
        key_field: String,
        value: String,
        reason: String,
    },

    #[error("unknown key splitter '{0}'")]
    UnknownSplitter(String),

    #[error("no assembly plan for target type '{0}'")]
    UnknownTargetType(String),
}

fn key_suffix(key: Option<&str>) -> String {
    match key {
        Some(key) => format!(" for key {key}"),
        None => String::new(),
    }
}

impl AssemblyError {
    /// Stable identifier used in reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::PathResolution { .. } => "PATH_RESOLUTION",
            Self::TemplateCycle { .. } => "TEMPLATE_CYCLE",
            Self::UnknownTemplate { .. } => "UNKNOWN_TEMPLATE",
            Self::Conversion { .. } => "CONVERSION",
            Self::ContainerLookup { .. } => "CONTAINER_LOOKUP",
            Self::UnknownContainer(_) => "UNKNOWN_CONTAINER",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::InvalidKey { .. } => "INVALID_KEY",
            Self::UnknownSplitter(_) => "UNKNOWN_SPLITTER",
            Self::UnknownTargetType(_) => "UNKNOWN_TARGET_TYPE",
        }
    }

    pub(crate) fn path_resolution(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(
        value: &serde_json::Value,
        target: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
