//! Dotted property paths (`"nested.name"`).
use crate::error::{AssemblyError, AssemblyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-empty sequence of field segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    pub fn parse(text: &str) -> AssemblyResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AssemblyError::InvalidPath {
                path: text.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(AssemblyError::InvalidPath {
                    path: text.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Parsed paths hold at least one segment, so this is false for them.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn last(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// True when `prefix` names this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &PropertyPath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self.segments.iter().zip(&prefix.segments).all(|(a, b)| a == b)
    }

    /// True when a write to one path can change what the other reads.
    pub fn overlaps(&self, other: &PropertyPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for PropertyPath {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PropertyPath {
    type Error = AssemblyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PropertyPath> for String {
    fn from(path: PropertyPath) -> Self {
        path.to_string()
    }
}
