//! Declarative assembly configuration.
//!
//! A config enumerates, per target type, the ordered assembly operations and
//! the shared template table they reference. It can be loaded from JSON or
//! built in code with the builder methods below.
use crate::container::KeyKind;
use crate::handler::HandlerKind;
use crate::path::PropertyPath;
use crate::resolve::{find_template_cycles, RuleResolver, Templates};
use crate::rule::{MappingStrategy, PropItem, RuleDecl};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssemblyConfig {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: Templates,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

/// One key field bound to one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    pub container: String,
    /// Key field path on the target.
    pub key: String,
    #[serde(default)]
    pub handler: HandlerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<PropItem>,
    /// Templates appended after `props`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
    /// Key splitter id for batch operations; `comma` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyKind>,
    #[serde(default)]
    pub strategy: MappingStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl AssemblyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template<I, P>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PropItem>,
    {
        self.templates
            .insert(name.into(), items.into_iter().map(Into::into).collect());
        self
    }

    /// Append `operation` to `target_type`, after any already declared.
    pub fn operation(mut self, target_type: impl Into<String>, operation: OperationConfig) -> Self {
        self.targets
            .entry(target_type.into())
            .or_default()
            .operations
            .push(operation);
        self
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            templates: Templates::new(),
            targets: BTreeMap::new(),
        }
    }
}

impl OperationConfig {
    pub fn new(container: impl Into<String>, key: impl Into<String>, handler: HandlerKind) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            handler,
            props: Vec::new(),
            templates: Vec::new(),
            splitter: None,
            key_type: None,
            strategy: MappingStrategy::default(),
            groups: Vec::new(),
        }
    }

    pub fn one_to_one(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(container, key, HandlerKind::OneToOne)
    }

    pub fn batch(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(container, key, HandlerKind::Batch)
    }

    pub fn prop(mut self, item: impl Into<PropItem>) -> Self {
        self.props.push(item.into());
        self
    }

    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.templates.push(name.into());
        self
    }

    pub fn splitter(mut self, id: impl Into<String>) -> Self {
        self.splitter = Some(id.into());
        self
    }

    pub fn key_type(mut self, kind: KeyKind) -> Self {
        self.key_type = Some(kind);
        self
    }

    pub fn strategy(mut self, strategy: MappingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Label used in logs and issues, e.g. `user_id@users`.
    pub fn label(&self) -> String {
        format!("{}@{}", self.key, self.container)
    }
}

/// A small but complete config, used for `oasm stub` and as documentation.
pub fn example_config() -> AssemblyConfig {
    AssemblyConfig::new()
        .template("audit", ["created_by", "updated_by"])
        .operation(
            "Order",
            OperationConfig::one_to_one("customers", "customer_id")
                .prop(RuleDecl::map("name", "customer_name"))
                .prop(RuleDecl::whole_to("customer"))
                .template("audit"),
        )
        .operation(
            "Order",
            OperationConfig::batch("tags", "tag_ids")
                .prop(RuleDecl::map("label", "tag_labels"))
                .group("listing"),
        )
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&example_config()).context("serialize config stub")
}

pub fn parse_config(text: &str) -> Result<AssemblyConfig> {
    serde_json::from_str(text).context("parse assembly config JSON")
}

pub fn load_config(path: &Path) -> Result<AssemblyConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("load {}", path.display()))
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &AssemblyConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize assembly config")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Check the schema version, every path, and every template reference.
///
/// Plan construction tolerates the same problems per operation; this is the
/// strict form used before shipping a config.
pub fn validate_config(config: &AssemblyConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported assembly config schema_version {}",
            config.schema_version
        ));
    }
    if let Some(cycle) = find_template_cycles(&config.templates).into_iter().next() {
        return Err(anyhow!("template cycle: {}", cycle.join(" -> ")));
    }
    let resolver = RuleResolver::new(&config.templates);
    for (target_type, target) in &config.targets {
        for (index, operation) in target.operations.iter().enumerate() {
            let scope = format!("{target_type}.operations[{index}]");
            if operation.container.trim().is_empty() {
                return Err(anyhow!("{scope}: container must be non-empty"));
            }
            PropertyPath::parse(&operation.key).with_context(|| format!("{scope}: key"))?;
            if let Some(splitter) = operation.splitter.as_deref() {
                if splitter.trim().is_empty() {
                    return Err(anyhow!("{scope}: splitter must be non-empty when set"));
                }
            }
            resolver
                .resolve(&scope, &operation.props, &operation.templates)
                .with_context(|| format!("{scope}: rules"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
