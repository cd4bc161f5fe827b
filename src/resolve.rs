//! Template graph validation and rule precedence.
//!
//! An operation's rules come from its own `props` and from templates spliced
//! in by reference. Resolution runs once per plan build and yields a
//! [`ResolvedRules`] ordered so that applying writes in sequence gives
//! last-write-wins with the closest scope winning:
//!
//! 1. scope distance, farthest first (direct rules are distance 0);
//! 2. splice order within a distance.
//!
//! A template reachable through several references is expanded once, at its
//! closest reference.
use crate::error::{AssemblyError, AssemblyResult};
use crate::rule::{MappingRule, PropItem, RuleOrigin};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::Arc;

pub type Templates = BTreeMap<String, Vec<PropItem>>;

/// Precedence-ordered, immutable rule list shared across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRules(Arc<[MappingRule]>);

impl ResolvedRules {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self(rules.into())
    }
}

impl Deref for ResolvedRules {
    type Target = [MappingRule];

    fn deref(&self) -> &[MappingRule] {
        &self.0
    }
}

fn template_refs(items: &[PropItem]) -> impl Iterator<Item = &str> {
    items.iter().filter_map(|item| match item {
        PropItem::Template(reference) => Some(reference.template.as_str()),
        PropItem::Rule(_) => None,
    })
}

/// Every cycle in the template graph, each as `a -> b -> ... -> a`.
pub fn find_template_cycles(templates: &Templates) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited = HashSet::new();
    for name in templates.keys() {
        let mut path = Vec::new();
        detect_cycles_dfs(name, templates, &mut visited, &mut path, &mut cycles);
    }
    cycles
}

fn detect_cycles_dfs<'a>(
    name: &'a str,
    templates: &'a Templates,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    if let Some(pos) = path.iter().position(|entry| *entry == name) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|entry| entry.to_string()).collect();
        cycle.push(name.to_string());
        cycles.push(cycle);
        return;
    }
    if visited.contains(name) {
        return;
    }
    path.push(name);
    if let Some(items) = templates.get(name) {
        for child in template_refs(items) {
            detect_cycles_dfs(child, templates, visited, path, cycles);
        }
    }
    path.pop();
    visited.insert(name);
}

/// Resolves the rule set of one operation against the shared template table.
pub struct RuleResolver<'a> {
    templates: &'a Templates,
}

impl<'a> RuleResolver<'a> {
    pub fn new(templates: &'a Templates) -> Self {
        Self { templates }
    }

    /// Resolve `props` followed by the `extra` template references.
    ///
    /// `scope` names the operation in error messages.
    pub fn resolve(
        &self,
        scope: &str,
        props: &[PropItem],
        extra: &[String],
    ) -> AssemblyResult<ResolvedRules> {
        let mut root: Vec<PropItem> = props.to_vec();
        root.extend(extra.iter().map(PropItem::template));

        self.check_reachable_cycles(scope, &root)?;
        let depths = self.closest_depths(&root);

        let mut expanded = HashSet::new();
        let mut rules = Vec::new();
        self.splice(&root, None, 0, &depths, &mut expanded, &mut rules)?;
        rules.sort_by(|a, b| {
            b.origin
                .distance()
                .cmp(&a.origin.distance())
                .then(a.order.cmp(&b.order))
        });
        Ok(ResolvedRules::new(rules))
    }

    /// Fail on unknown templates and on cycles reachable from `root`.
    fn check_reachable_cycles(&self, scope: &str, root: &[PropItem]) -> AssemblyResult<()> {
        fn walk<'t>(
            templates: &'t Templates,
            scope: &str,
            name: &'t str,
            path: &mut Vec<&'t str>,
            done: &mut HashSet<&'t str>,
        ) -> AssemblyResult<()> {
            if let Some(pos) = path.iter().position(|entry| *entry == name) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|e| e.to_string()).collect();
                cycle.push(name.to_string());
                return Err(AssemblyError::TemplateCycle { cycle });
            }
            if done.contains(name) {
                return Ok(());
            }
            let items = templates.get(name).ok_or_else(|| AssemblyError::UnknownTemplate {
                name: name.to_string(),
                scope: match path.last() {
                    Some(parent) => format!("template '{parent}'"),
                    None => scope.to_string(),
                },
            })?;
            path.push(name);
            for child in template_refs(items) {
                walk(templates, scope, child, path, done)?;
            }
            path.pop();
            done.insert(name);
            Ok(())
        }

        let mut done = HashSet::new();
        for name in template_refs(root) {
            walk(self.templates, scope, name, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }

    /// Shortest reference distance of every template reachable from `root`.
    fn closest_depths(&self, root: &[PropItem]) -> HashMap<&'a str, usize> {
        let mut depths = HashMap::new();
        let mut queue = VecDeque::new();
        for name in template_refs(root) {
            if let Some((key, _)) = self.templates.get_key_value(name) {
                queue.push_back((key.as_str(), 1));
            }
        }
        while let Some((name, depth)) = queue.pop_front() {
            if depths.contains_key(name) {
                continue;
            }
            depths.insert(name, depth);
            if let Some(items) = self.templates.get(name) {
                for child in template_refs(items) {
                    if let Some((key, _)) = self.templates.get_key_value(child) {
                        queue.push_back((key.as_str(), depth + 1));
                    }
                }
            }
        }
        depths
    }

    fn splice(
        &self,
        items: &[PropItem],
        template: Option<&str>,
        depth: usize,
        depths: &HashMap<&'a str, usize>,
        expanded: &mut HashSet<String>,
        rules: &mut Vec<MappingRule>,
    ) -> AssemblyResult<()> {
        for item in items {
            match item {
                PropItem::Rule(decl) => {
                    let (src, reference) = decl.paths()?;
                    let origin = match template {
                        Some(name) => RuleOrigin::Template {
                            name: name.to_string(),
                            depth,
                        },
                        None => RuleOrigin::Direct,
                    };
                    rules.push(MappingRule {
                        src,
                        reference,
                        order: rules.len(),
                        origin,
                    });
                }
                PropItem::Template(reference) => {
                    let name = reference.template.as_str();
                    let closest = depths.get(name).copied();
                    if closest != Some(depth + 1) || expanded.contains(name) {
                        continue;
                    }
                    expanded.insert(name.to_string());
                    if let Some(children) = self.templates.get(name) {
                        self.splice(children, Some(name), depth + 1, depths, expanded, rules)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
