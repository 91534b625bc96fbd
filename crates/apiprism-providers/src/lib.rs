//! apiprism providers - uniform access to heterogeneous AI backends
//!
//! Each backend is wrapped in an adapter implementing [`Provider`]. Adapters are
//! created through a [`ProviderRegistry`] from one opaque credential, list the
//! models they offer, and declare a fixed set of [`Endpoint`]s that
//! [`EndpointValidator`] probes concurrently, recording status, latency and
//! error on each record.

pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod http_probe;
pub mod models;
pub mod provider;
pub mod providers;
pub mod redaction;
pub mod validator;

// Re-export commonly used types
pub use config::{ConfigurationManager, ProviderSettings, ProvidersConfig, ValidationDefaults};
pub use context::{CancelReason, ProbeContext};
pub use credential::{split_composite, CompositeCredential};
pub use error::ProviderError;
pub use http_probe::{HttpProbe, StatusPolicy};
pub use models::{
    Endpoint, EndpointCache, EndpointList, EndpointOutcome, EndpointStatus, HttpMethod, Model,
    ProviderCapabilities,
};
pub use provider::{
    Provider, ProviderFactory, ProviderHealth, ProviderManager, ProviderRegistry,
};
pub use providers::{
    register_builtin_providers, AnthropicProvider, CloudflareProvider, OpenAiCompatibleKind,
    OpenAiCompatibleProvider, BUILTIN_PROVIDERS,
};
pub use redaction::{contains_sensitive_info, redact, Redacted};
pub use validator::{
    probe_fn, validate_endpoints, EndpointProbe, EndpointValidator, ProbeFn, ValidationSummary,
};
