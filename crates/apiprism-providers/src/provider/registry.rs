//! Provider registry mapping provider names to factories

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::Provider;
use crate::error::ProviderError;

/// Builds a provider instance bound to one opaque credential
pub type ProviderFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Registry of provider factories
///
/// Owns factories, never instances. Constructed once at startup and shared by
/// `Arc`; registration is lock-protected so late registration stays safe.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<BTreeMap<String, ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register_provider<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync + 'static,
    {
        self.register_factory(name, Arc::new(factory));
    }

    /// Register an already shared factory under `name`
    pub fn register_factory(&self, name: impl Into<String>, factory: ProviderFactory) {
        let name = name.into();
        debug!("Registering provider factory: {}", name);
        self.factories.write().insert(name, factory);
    }

    /// Look up the factory registered under `name`
    pub fn get_provider_factory(&self, name: &str) -> Option<ProviderFactory> {
        self.factories.read().get(name).cloned()
    }

    /// Registered provider names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Build a provider instance for `name` bound to `credential`
    pub fn create(&self, name: &str, credential: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        let factory = self
            .get_provider_factory(name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))?;
        factory(credential)
    }

    /// Remove the factory registered under `name`
    pub fn unregister(&self, name: &str) -> Result<(), ProviderError> {
        self.factories
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Get the number of registered providers
    pub fn provider_count(&self) -> usize {
        self.factories.read().len()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}
