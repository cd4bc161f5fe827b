//! Assembly orchestration.
//!
//! For each lookup stage of a target plan the engine
//!
//! 1. extracts keys for every operation from every target,
//! 2. calls each distinct container once with the union of its keys,
//! 3. applies results operation by operation, target by target.
//!
//! Failures degrade locally and are collected in the returned
//! [`AssemblyReport`]; only an unknown target type fails the call.
use crate::accessor::PropertyAccessor;
use crate::container::{Container, ContainerRegistry, Key, Lookup};
use crate::convert::{DefaultConverter, TypeConverter};
use crate::error::{AssemblyError, AssemblyResult};
use crate::handler::{extract_keys, Applier, ConversionPolicy, HandlerKind, MissingKeyPolicy};
use crate::plan::{AssemblyOperation, AssemblyPlan};
use crate::report::AssemblyReport;
use crate::splitter::SplitterRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Run-wide policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(default)]
    pub missing_key: MissingKeyPolicy,
    #[serde(default)]
    pub conversion: ConversionPolicy,
}

impl EngineOptions {
    pub fn with_missing_key(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn with_conversion(mut self, policy: ConversionPolicy) -> Self {
        self.conversion = policy;
        self
    }
}

pub struct AssemblyEngine<A: PropertyAccessor> {
    plan: Arc<AssemblyPlan>,
    containers: Arc<ContainerRegistry>,
    splitters: Arc<SplitterRegistry>,
    accessor: A,
    converter: Arc<dyn TypeConverter>,
    options: EngineOptions,
}

struct PreparedOperation<'p> {
    operation: &'p AssemblyOperation,
    container: Arc<dyn Container>,
    /// Keys per target, indexed like the target slice.
    keys: Vec<Vec<Key>>,
}

impl<A: PropertyAccessor> AssemblyEngine<A> {
    pub fn new(plan: Arc<AssemblyPlan>, containers: Arc<ContainerRegistry>, accessor: A) -> Self {
        Self {
            plan,
            containers,
            splitters: Arc::new(SplitterRegistry::default()),
            accessor,
            converter: Arc::new(DefaultConverter::new()),
            options: EngineOptions::default(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_splitters(mut self, splitters: Arc<SplitterRegistry>) -> Self {
        self.splitters = splitters;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn plan(&self) -> &AssemblyPlan {
        &self.plan
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Run every operation of `type_name` over `targets`.
    pub fn assemble(
        &self,
        type_name: &str,
        targets: &mut [A::Target],
    ) -> AssemblyResult<AssemblyReport> {
        self.run(type_name, targets, None)
    }

    pub fn assemble_one(
        &self,
        type_name: &str,
        target: &mut A::Target,
    ) -> AssemblyResult<AssemblyReport> {
        self.run(type_name, std::slice::from_mut(target), None)
    }

    /// Run only the operations tagged with one of `groups`.
    pub fn assemble_groups(
        &self,
        type_name: &str,
        targets: &mut [A::Target],
        groups: &[String],
    ) -> AssemblyResult<AssemblyReport> {
        self.run(type_name, targets, Some(groups))
    }

    fn run(
        &self,
        type_name: &str,
        targets: &mut [A::Target],
        groups: Option<&[String]>,
    ) -> AssemblyResult<AssemblyReport> {
        let start = Instant::now();
        let plan = self.plan.target(type_name)?;
        let mut report = AssemblyReport::new(type_name, targets.len());
        for rejected in plan.rejected_in(groups) {
            report.error(rejected.error.clone(), None, &rejected.label);
        }

        let applier = Applier::new(&self.accessor, self.converter.as_ref(), &self.options);
        let stages = plan.stages(groups);
        for (stage_index, stage) in stages.iter().enumerate() {
            tracing::debug!(
                target_type = type_name,
                stage = stage_index,
                operations = stage.len(),
                "assembly stage"
            );
            self.run_stage(stage, targets, &applier, &mut report);
        }

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            target_type = type_name,
            targets = targets.len(),
            stages = stages.len(),
            lookups = report.lookups,
            writes = report.writes,
            warnings = report.warnings().count(),
            errors = report.errors().count(),
            "assembly complete"
        );
        Ok(report)
    }

    fn run_stage(
        &self,
        stage: &[&AssemblyOperation],
        targets: &mut [A::Target],
        applier: &Applier<'_, A>,
        report: &mut AssemblyReport,
    ) {
        let prepared: Vec<PreparedOperation<'_>> = stage
            .iter()
            .copied()
            .filter_map(|operation| self.prepare(operation, targets, report))
            .collect();

        let mut wanted: BTreeMap<&str, (Arc<dyn Container>, BTreeSet<Key>)> = BTreeMap::new();
        for entry in &prepared {
            let (_, keys) = wanted
                .entry(entry.operation.container.as_str())
                .or_insert_with(|| (Arc::clone(&entry.container), BTreeSet::new()));
            for target_keys in &entry.keys {
                keys.extend(target_keys.iter().cloned());
            }
        }

        let mut results: HashMap<&str, Lookup> = HashMap::new();
        let mut failures: HashMap<&str, String> = HashMap::new();
        for (namespace, (container, keys)) in wanted {
            if keys.is_empty() {
                results.insert(namespace, Lookup::new());
                continue;
            }
            report.lookups += 1;
            let started = Instant::now();
            match container.lookup(&keys) {
                Ok(lookup) => {
                    tracing::debug!(
                        container = namespace,
                        keys = keys.len(),
                        found = lookup.found.len(),
                        failed = lookup.failures.len(),
                        elapsed_ms = started.elapsed().as_millis(),
                        "container lookup"
                    );
                    results.insert(namespace, lookup);
                }
                Err(error) => {
                    failures.insert(namespace, format!("{error:#}"));
                }
            }
        }

        for entry in &prepared {
            let namespace = entry.operation.container.as_str();
            let Some(lookup) = results.get(namespace) else {
                let reason = failures
                    .get(namespace)
                    .cloned()
                    .unwrap_or_else(|| "no result".to_string());
                report.error(
                    AssemblyError::ContainerLookup {
                        container: namespace.to_string(),
                        key: None,
                        reason,
                    },
                    None,
                    &entry.operation.label(),
                );
                continue;
            };
            for (index, target) in targets.iter_mut().enumerate() {
                applier.apply(entry.operation, target, index, &entry.keys[index], lookup, report);
            }
        }
    }

    /// Resolve the container and splitter of `operation` and read its keys.
    fn prepare<'p>(
        &self,
        operation: &'p AssemblyOperation,
        targets: &[A::Target],
        report: &mut AssemblyReport,
    ) -> Option<PreparedOperation<'p>> {
        let label = operation.label();
        let container = match self.containers.get(&operation.container) {
            Ok(container) => container,
            Err(error) => {
                report.error(error, None, &label);
                return None;
            }
        };
        let splitter = match operation.handler {
            HandlerKind::OneToOne => None,
            HandlerKind::Batch => match self.splitters.get(operation.splitter.as_deref()) {
                Ok(splitter) => Some(splitter),
                Err(error) => {
                    report.error(error, None, &label);
                    return None;
                }
            },
        };
        let natural = container.key_kind();
        let mut keys = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let raw = match self.accessor.get(target, &operation.key_field) {
                Ok(raw) => raw,
                Err(error) => {
                    report.warn(error, Some(index), &label);
                    None
                }
            };
            let extracted = extract_keys(operation, raw.as_ref(), splitter.as_deref(), natural);
            for error in extracted.invalid {
                report.warn(error, Some(index), &label);
            }
            keys.push(extracted.keys);
        }
        Some(PreparedOperation {
            operation,
            container,
            keys,
        })
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
