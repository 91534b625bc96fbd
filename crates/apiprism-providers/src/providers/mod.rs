//! Built-in provider implementations

use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use crate::{
    config::ProvidersConfig,
    provider::{Provider, ProviderRegistry},
};

pub mod anthropic;
pub mod cloudflare;
pub mod enrichment;
pub mod openai_compatible;

pub use anthropic::AnthropicProvider;
pub use cloudflare::CloudflareProvider;
pub use enrichment::{EnrichmentTable, ModelProfile};
pub use openai_compatible::{OpenAiCompatibleKind, OpenAiCompatibleProvider};

/// Ids of every built-in provider, sorted
pub const BUILTIN_PROVIDERS: [&str; 7] = [
    "anthropic",
    "cloudflare",
    "deepseek",
    "groq",
    "mistral",
    "openai",
    "together",
];

/// Register every built-in provider factory on `registry`
///
/// Factories share one HTTP client and pick up per-provider `base_url`
/// overrides from `config`.
pub fn register_builtin_providers(registry: &ProviderRegistry, config: &ProvidersConfig) {
    let client = Arc::new(Client::new());

    for kind in OpenAiCompatibleKind::ALL {
        let client = client.clone();
        let base_url = config
            .base_url_for(kind.id())
            .unwrap_or(kind.default_base_url())
            .to_string();
        registry.register_provider(kind.id(), move |credential| {
            let provider =
                OpenAiCompatibleProvider::with_client(client.clone(), kind, credential, &base_url)?;
            Ok(Arc::new(provider) as Arc<dyn Provider>)
        });
    }

    let anthropic_client = client.clone();
    let anthropic_url = config
        .base_url_for("anthropic")
        .unwrap_or(anthropic::ANTHROPIC_BASE_URL)
        .to_string();
    registry.register_provider("anthropic", move |credential| {
        let provider =
            AnthropicProvider::with_client(anthropic_client.clone(), credential, &anthropic_url)?;
        Ok(Arc::new(provider) as Arc<dyn Provider>)
    });

    let cloudflare_url = config
        .base_url_for("cloudflare")
        .unwrap_or(cloudflare::CLOUDFLARE_BASE_URL)
        .to_string();
    registry.register_provider("cloudflare", move |credential| {
        let provider =
            CloudflareProvider::with_client(client.clone(), credential, &cloudflare_url)?;
        Ok(Arc::new(provider) as Arc<dyn Provider>)
    });

    debug!("Registered {} built-in providers", BUILTIN_PROVIDERS.len());
}
