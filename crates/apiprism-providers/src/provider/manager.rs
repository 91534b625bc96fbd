//! Provider manager for orchestrating validation across providers

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{Provider, ProviderRegistry};
use crate::config::ProvidersConfig;
use crate::context::ProbeContext;
use crate::error::ProviderError;
use crate::models::Endpoint;
use crate::validator::ValidationSummary;

/// Result of validating one provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub summary: ValidationSummary,
    /// Endpoint records as they stood after the pass
    pub endpoints: Vec<Endpoint>,
}

impl ProviderHealth {
    /// True when at least one endpoint was probed and none answered
    pub fn is_down(&self) -> bool {
        self.summary.all_failed()
    }
}

/// Central coordinator binding configured credentials to registered providers
pub struct ProviderManager {
    registry: Arc<ProviderRegistry>,
    config: ProvidersConfig,
    root: ProbeContext,
    instances: Mutex<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderManager {
    /// Create a new provider manager
    pub fn new(registry: Arc<ProviderRegistry>, config: ProvidersConfig) -> Self {
        Self {
            registry,
            config,
            root: ProbeContext::background(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Derive every pass from `ctx`, so cancelling it stops all of them
    pub fn with_context(mut self, ctx: ProbeContext) -> Self {
        self.root = ctx;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ProvidersConfig {
        &self.config
    }

    /// Cancel every in-flight and future pass started by this manager
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Registered providers that have a configured credential, sorted
    pub fn configured_providers(&self) -> Vec<String> {
        self.registry
            .list_providers()
            .into_iter()
            .filter(|id| self.config.credential_for(id).is_some())
            .collect()
    }

    /// Get (or build and cache) the instance for `provider_id`
    pub fn provider(&self, provider_id: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        if let Some(provider) = self.instances.lock().get(provider_id) {
            return Ok(provider.clone());
        }

        if !self.registry.has_provider(provider_id) {
            return Err(ProviderError::NotFound(provider_id.to_string()));
        }
        let credential = self.config.credential_for(provider_id).ok_or_else(|| {
            ProviderError::InvalidCredential(format!(
                "no credential configured for provider '{}'",
                provider_id
            ))
        })?;

        let provider = self.registry.create(provider_id, credential)?;
        debug!("Built provider instance: {}", provider_id);

        // A concurrent caller may have won; keep whichever landed first.
        let mut instances = self.instances.lock();
        Ok(instances
            .entry(provider_id.to_string())
            .or_insert(provider)
            .clone())
    }

    /// Forget a cached instance so the next call rebuilds it
    pub fn evict(&self, provider_id: &str) -> bool {
        self.instances.lock().remove(provider_id).is_some()
    }

    /// Validate one provider under its configured deadline
    #[instrument(level = "debug", skip(self))]
    pub async fn validate(&self, provider_id: &str) -> Result<ProviderHealth, ProviderError> {
        let provider = self.provider(provider_id)?;
        let ctx = self
            .root
            .child_with_timeout(self.config.timeout_for(provider_id));

        let summary = provider
            .validate_endpoints(&ctx, self.config.defaults.verbose)
            .await?;

        if summary.all_failed() {
            warn!("Every probed endpoint of {} failed", provider_id);
        } else {
            info!(
                "{}: {}/{} endpoints working",
                provider_id,
                summary.working,
                summary.probed()
            );
        }

        Ok(ProviderHealth {
            provider: provider_id.to_string(),
            summary,
            endpoints: provider.endpoints().snapshot(),
        })
    }

    /// Validate every configured provider concurrently
    pub async fn validate_all(&self) -> Vec<(String, Result<ProviderHealth, ProviderError>)> {
        let ids = self.configured_providers();
        debug!("Validating {} configured providers", ids.len());

        let results = join_all(ids.iter().map(|id| self.validate(id))).await;
        ids.into_iter().zip(results).collect()
    }

    /// Issue one minimal request against `model_id` under the model deadline
    pub async fn test_model(&self, provider_id: &str, model_id: &str) -> Result<(), ProviderError> {
        let provider = self.provider(provider_id)?;
        let ctx = self.root.child_with_timeout(self.config.model_timeout());
        provider
            .test_model(&ctx, model_id, self.config.defaults.verbose)
            .await
    }
}
