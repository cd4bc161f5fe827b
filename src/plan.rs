//! Compiled assembly plans.
//!
//! A plan is built once from an [`AssemblyConfig`]: rule sets are resolved,
//! paths parsed and broken operations set aside. Plans are immutable and
//! meant to be shared behind an `Arc` across any number of engine runs.
use crate::config::{AssemblyConfig, OperationConfig};
use crate::container::KeyKind;
use crate::error::{AssemblyError, AssemblyResult};
use crate::handler::HandlerKind;
use crate::path::PropertyPath;
use crate::resolve::{find_template_cycles, ResolvedRules, RuleResolver};
use crate::rule::MappingStrategy;
use std::collections::BTreeMap;

/// One key field bound to one container and a resolved rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOperation {
    /// Declaration position within the target type.
    pub index: usize,
    pub container: String,
    pub key_field: PropertyPath,
    pub rules: ResolvedRules,
    pub handler: HandlerKind,
    pub splitter: Option<String>,
    pub key_kind: Option<KeyKind>,
    pub strategy: MappingStrategy,
    pub groups: Vec<String>,
}

impl AssemblyOperation {
    pub fn label(&self) -> String {
        format!("{}@{}", self.key_field, self.container)
    }

    /// Every path this operation may write.
    pub fn written_paths(&self) -> impl Iterator<Item = &PropertyPath> {
        self.rules.iter().map(|rule| rule.target(&self.key_field))
    }

    pub fn in_any_group(&self, groups: &[String]) -> bool {
        self.groups.iter().any(|group| groups.contains(group))
    }
}

/// An operation that failed setup; reported on every run of its target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOperation {
    pub index: usize,
    pub label: String,
    pub groups: Vec<String>,
    pub error: AssemblyError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPlan {
    pub operations: Vec<AssemblyOperation>,
    pub rejected: Vec<RejectedOperation>,
}

impl TargetPlan {
    pub fn operation(&self, key_field: &str) -> Option<&AssemblyOperation> {
        self.operations
            .iter()
            .find(|operation| operation.key_field.to_string() == key_field)
    }

    /// Split the selected operations into lookup stages.
    ///
    /// A stage ends just before an operation whose key field overlaps a path
    /// written earlier in the same stage, so chained operations see the
    /// values they depend on. `groups = None` selects every operation.
    pub fn stages(&self, groups: Option<&[String]>) -> Vec<Vec<&AssemblyOperation>> {
        let mut stages: Vec<Vec<&AssemblyOperation>> = Vec::new();
        let mut current: Vec<&AssemblyOperation> = Vec::new();
        let mut written: Vec<&PropertyPath> = Vec::new();
        let selected = self
            .operations
            .iter()
            .filter(|operation| match groups {
                None => true,
                Some(groups) => operation.in_any_group(groups),
            });
        for operation in selected {
            let depends = written
                .iter()
                .any(|path| path.overlaps(&operation.key_field));
            if depends && !current.is_empty() {
                stages.push(std::mem::take(&mut current));
                written.clear();
            }
            written.extend(operation.written_paths());
            current.push(operation);
        }
        if !current.is_empty() {
            stages.push(current);
        }
        stages
    }

    pub fn rejected_in<'a>(
        &'a self,
        groups: Option<&'a [String]>,
    ) -> impl Iterator<Item = &'a RejectedOperation> + 'a {
        self.rejected.iter().filter(move |rejected| match groups {
            None => true,
            Some(groups) => rejected.groups.iter().any(|group| groups.contains(group)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyPlan {
    targets: BTreeMap<String, TargetPlan>,
    template_cycles: Vec<Vec<String>>,
}

impl AssemblyPlan {
    /// Compile `config`. Never fails as a whole: broken operations are
    /// rejected individually and kept for reporting.
    pub fn build(config: &AssemblyConfig) -> Self {
        let template_cycles = find_template_cycles(&config.templates);
        for cycle in &template_cycles {
            tracing::warn!(cycle = %cycle.join(" -> "), "template cycle detected");
        }
        let resolver = RuleResolver::new(&config.templates);
        let mut targets = BTreeMap::new();
        for (type_name, target) in &config.targets {
            let mut plan = TargetPlan::default();
            for (index, operation) in target.operations.iter().enumerate() {
                match compile_operation(&resolver, type_name, index, operation) {
                    Ok(compiled) => plan.operations.push(compiled),
                    Err(error) => {
                        tracing::warn!(
                            target_type = %type_name,
                            operation = %operation.label(),
                            code = error.code(),
                            %error,
                            "operation rejected"
                        );
                        plan.rejected.push(RejectedOperation {
                            index,
                            label: operation.label(),
                            groups: operation.groups.clone(),
                            error,
                        });
                    }
                }
            }
            tracing::debug!(
                target_type = %type_name,
                operations = plan.operations.len(),
                rejected = plan.rejected.len(),
                "target plan compiled"
            );
            targets.insert(type_name.clone(), plan);
        }
        Self {
            targets,
            template_cycles,
        }
    }

    pub fn target(&self, type_name: &str) -> AssemblyResult<&TargetPlan> {
        self.targets
            .get(type_name)
            .ok_or_else(|| AssemblyError::UnknownTargetType(type_name.to_string()))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn template_cycles(&self) -> &[Vec<String>] {
        &self.template_cycles
    }
}

fn compile_operation(
    resolver: &RuleResolver<'_>,
    type_name: &str,
    index: usize,
    config: &OperationConfig,
) -> AssemblyResult<AssemblyOperation> {
    let key_field = PropertyPath::parse(&config.key)?;
    let scope = format!("operation '{}' of {type_name}", config.label());
    let rules = resolver.resolve(&scope, &config.props, &config.templates)?;
    Ok(AssemblyOperation {
        index,
        container: config.container.clone(),
        key_field,
        rules,
        handler: config.handler,
        splitter: config.splitter.clone(),
        key_kind: config.key_type,
        strategy: config.strategy,
        groups: config.groups.clone(),
    })
}
