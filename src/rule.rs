//! Mapping rules: declared `src -> ref` bindings and their fallback semantics.
use crate::accessor::read_path;
use crate::error::AssemblyResult;
use crate::path::PropertyPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A rule as written in configuration.
///
/// A bare string `"name"` stands for `src = ref = name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleDecl {
    Named(String),
    Explicit(RuleSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Reference to a named template, spliced in where it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateRef {
    pub template: String,
}

/// One entry of an operation's or template's `props` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropItem {
    Template(TemplateRef),
    Rule(RuleDecl),
}

impl RuleDecl {
    pub fn named(name: impl Into<String>) -> Self {
        RuleDecl::Named(name.into())
    }

    pub fn map(src: impl Into<String>, reference: impl Into<String>) -> Self {
        RuleDecl::Explicit(RuleSpec {
            src: Some(src.into()),
            reference: Some(reference.into()),
        })
    }

    /// Write the whole source object to `reference`.
    pub fn whole_to(reference: impl Into<String>) -> Self {
        RuleDecl::Explicit(RuleSpec {
            src: None,
            reference: Some(reference.into()),
        })
    }

    /// Copy `src` into the key field itself.
    pub fn into_key(src: impl Into<String>) -> Self {
        RuleDecl::Explicit(RuleSpec {
            src: Some(src.into()),
            reference: None,
        })
    }

    /// Parse into `(src, ref)` paths.
    pub fn paths(&self) -> AssemblyResult<(Option<PropertyPath>, Option<PropertyPath>)> {
        match self {
            RuleDecl::Named(name) => {
                let path = PropertyPath::parse(name)?;
                Ok((Some(path.clone()), Some(path)))
            }
            RuleDecl::Explicit(spec) => Ok((
                spec.src.as_deref().map(PropertyPath::parse).transpose()?,
                spec.reference.as_deref().map(PropertyPath::parse).transpose()?,
            )),
        }
    }
}

impl PropItem {
    pub fn template(name: impl Into<String>) -> Self {
        PropItem::Template(TemplateRef {
            template: name.into(),
        })
    }
}

impl From<RuleDecl> for PropItem {
    fn from(rule: RuleDecl) -> Self {
        PropItem::Rule(rule)
    }
}

impl From<&str> for PropItem {
    fn from(name: &str) -> Self {
        PropItem::Rule(RuleDecl::named(name))
    }
}

/// Where a resolved rule was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOrigin {
    Direct,
    /// Declared in `name`, reached through `depth` template references.
    Template { name: String, depth: usize },
}

impl RuleOrigin {
    /// Scope distance from the operation: 0 for direct rules.
    pub fn distance(&self) -> usize {
        match self {
            RuleOrigin::Direct => 0,
            RuleOrigin::Template { depth, .. } => *depth,
        }
    }
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOrigin::Direct => f.write_str("direct"),
            RuleOrigin::Template { name, depth } => write!(f, "template '{name}' (depth {depth})"),
        }
    }
}

/// What a rule reads from a source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector<'a> {
    Property(&'a PropertyPath),
    Whole,
}

/// A resolved `src -> ref` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub src: Option<PropertyPath>,
    pub reference: Option<PropertyPath>,
    /// Splice position across the operation and all expanded templates.
    pub order: usize,
    pub origin: RuleOrigin,
}

impl MappingRule {
    pub fn source(&self) -> SourceSelector<'_> {
        match &self.src {
            Some(path) => SourceSelector::Property(path),
            None => SourceSelector::Whole,
        }
    }

    /// Destination path; the key field when `ref` is omitted.
    pub fn target<'a>(&'a self, key_field: &'a PropertyPath) -> &'a PropertyPath {
        self.reference.as_ref().unwrap_or(key_field)
    }

    /// Read this rule's value from a source object. `None` means absent.
    pub fn read<'v>(&self, source: &'v Value) -> AssemblyResult<Option<&'v Value>> {
        match self.source() {
            SourceSelector::Whole => Ok((!source.is_null()).then_some(source)),
            SourceSelector::Property(path) => read_path(source, path),
        }
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let src = self.src.as_ref().map_or_else(|| "*".to_string(), ToString::to_string);
        let reference = self
            .reference
            .as_ref()
            .map_or_else(|| "<key>".to_string(), ToString::to_string);
        write!(f, "{src} -> {reference} [{}]", self.origin)
    }
}

/// Per-operation write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    /// Always write.
    #[default]
    Overwrite,
    /// Skip null values.
    OverwriteNotNull,
    /// Write only when the target path is currently absent.
    KeepExisting,
}

impl MappingStrategy {
    pub fn should_write(self, existing: Option<&Value>, incoming: &Value) -> bool {
        match self {
            MappingStrategy::Overwrite => true,
            MappingStrategy::OverwriteNotNull => !incoming.is_null(),
            MappingStrategy::KeepExisting => matches!(existing, None | Some(Value::Null)),
        }
    }
}
