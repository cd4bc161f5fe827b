//! Namespace -> container resolution.
use super::Container;
use crate::error::{AssemblyError, AssemblyResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Supplies containers on demand for namespaces nobody registered directly.
pub trait ContainerProvider: Send + Sync {
    fn provide(&self, namespace: &str) -> Option<Arc<dyn Container>>;
}

impl<F> ContainerProvider for F
where
    F: Fn(&str) -> Option<Arc<dyn Container>> + Send + Sync,
{
    fn provide(&self, namespace: &str) -> Option<Arc<dyn Container>> {
        self(namespace)
    }
}

/// Registered containers first, then providers in registration order.
///
/// Containers obtained from a provider are cached under their namespace.
#[derive(Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<String, Arc<dyn Container>>>,
    providers: RwLock<Vec<Arc<dyn ContainerProvider>>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under its own namespace, returning any replaced one.
    pub fn register<C>(&self, container: C) -> Option<Arc<dyn Container>>
    where
        C: Container + 'static,
    {
        self.register_arc(Arc::new(container))
    }

    pub fn register_arc(&self, container: Arc<dyn Container>) -> Option<Arc<dyn Container>> {
        let namespace = container.namespace().to_string();
        self.containers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(namespace, container)
    }

    pub fn register_provider<P>(&self, provider: P)
    where
        P: ContainerProvider + 'static,
    {
        self.providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(provider));
    }

    pub fn get(&self, namespace: &str) -> AssemblyResult<Arc<dyn Container>> {
        if let Some(container) = self
            .containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(namespace)
        {
            return Ok(Arc::clone(container));
        }

        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for provider in providers {
            if let Some(container) = provider.provide(namespace) {
                tracing::debug!(namespace, "container supplied by provider");
                let mut containers = self
                    .containers
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let cached = containers
                    .entry(namespace.to_string())
                    .or_insert(container);
                return Ok(Arc::clone(cached));
            }
        }
        Err(AssemblyError::UnknownContainer(namespace.to_string()))
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("namespaces", &self.namespaces())
            .finish_non_exhaustive()
    }
}
