//! Provider trait and registry

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    context::ProbeContext,
    error::ProviderError,
    models::{EndpointList, Model, ProviderCapabilities},
    validator::{EndpointProbe, EndpointValidator, ValidationSummary},
};

pub mod manager;
pub mod registry;

pub use manager::{ProviderHealth, ProviderManager};
pub use registry::{ProviderFactory, ProviderRegistry};

/// Core trait that all providers must implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key of the provider
    fn id(&self) -> &str;

    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Discover the models the backend offers, enriched with static metadata
    ///
    /// `verbose` only affects diagnostics.
    async fn list_models(&self, ctx: &ProbeContext, verbose: bool)
        -> Result<Vec<Model>, ProviderError>;

    /// Static provider-level capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// The provider's probe set
    ///
    /// Built on first call; every later call returns a handle to the same
    /// records so validation results stay visible.
    fn endpoints(&self) -> EndpointList;

    /// Probe policy used when validating [`Provider::endpoints`]
    fn prober(&self) -> Result<Arc<dyn EndpointProbe>, ProviderError>;

    /// Probe every endpoint concurrently and record the outcomes on them
    ///
    /// Endpoint failures never surface here; inspect [`Provider::endpoints`]
    /// afterwards. An error means validation could not start at all.
    async fn validate_endpoints(
        &self,
        ctx: &ProbeContext,
        verbose: bool,
    ) -> Result<ValidationSummary, ProviderError> {
        let probe = self.prober()?;
        let endpoints = self.endpoints();
        debug!(
            "Validating {} endpoints for provider: {}",
            endpoints.len(),
            self.id()
        );
        Ok(EndpointValidator::new()
            .validate(ctx, &endpoints, probe, verbose)
            .await)
    }

    /// Issue one minimal real request against `model_id`
    async fn test_model(
        &self,
        ctx: &ProbeContext,
        model_id: &str,
        verbose: bool,
    ) -> Result<(), ProviderError>;
}
