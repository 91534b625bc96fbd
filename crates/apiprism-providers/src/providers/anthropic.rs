//! Anthropic provider implementation
//!
//! Discovers Claude models via `GET /v1/models` and probes the Messages API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::enrichment::{EnrichmentTable, ModelProfile};
use crate::{
    context::ProbeContext,
    credential,
    error::ProviderError,
    http_probe::{self, HttpProbe, StatusPolicy},
    models::{Endpoint, EndpointCache, EndpointList, Model, ProviderCapabilities},
    provider::Provider,
    validator::EndpointProbe,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROBE_MODEL: &str = "claude-3-5-haiku-latest";

static CLAUDE_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "opus-4",
                ModelProfile::chat(15.0, 75.0, 200_000, 32_000)
                    .with_images()
                    .with_reasoning(),
            ),
            (
                "sonnet-4|3-7-sonnet",
                ModelProfile::chat(3.0, 15.0, 200_000, 64_000)
                    .with_images()
                    .with_reasoning(),
            ),
            (
                "3-5-sonnet",
                ModelProfile::chat(3.0, 15.0, 200_000, 8_192).with_images(),
            ),
            ("3-5-haiku", ModelProfile::chat(0.8, 4.0, 200_000, 8_192)),
            (
                "3-opus",
                ModelProfile::chat(15.0, 75.0, 200_000, 4_096).with_images(),
            ),
            (
                "3-haiku",
                ModelProfile::chat(0.25, 1.25, 200_000, 4_096).with_images(),
            ),
        ],
        ModelProfile::chat(3.0, 15.0, 200_000, 4_096).with_images(),
    )
});

/// Anthropic provider implementation
pub struct AnthropicProvider {
    api_key: String,
    client: Arc<Client>,
    base_url: String,
    endpoints: EndpointCache,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider instance
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, ANTHROPIC_BASE_URL)
    }

    /// Create a new Anthropic provider with a custom base URL
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ProviderError> {
        Self::with_client(Arc::new(Client::new()), api_key, base_url)
    }

    /// Create a new Anthropic provider with a custom HTTP client and base URL
    pub fn with_client(
        client: Arc<Client>,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let api_key = credential::require(api_key, "Anthropic")?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: EndpointCache::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> [(&'static str, String); 2] {
        [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn request(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (name, value) in self.auth_headers() {
            builder = builder.header(name, value);
        }
        builder
    }

    fn build_endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::get("/v1/models")
                .with_description("List available models")
                .with_headers(self.auth_headers()),
            Endpoint::post("/v1/messages")
                .with_description("Create a message")
                .with_headers(self.auth_headers())
                .with_test_params(json!({
                    "model": PROBE_MODEL,
                    "max_tokens": 1,
                    "messages": [{ "role": "user", "content": "ping" }]
                })),
            Endpoint::post("/v1/messages/count_tokens")
                .with_description("Count tokens for a message")
                .with_headers(self.auth_headers())
                .with_test_params(json!({
                    "model": PROBE_MODEL,
                    "messages": [{ "role": "user", "content": "ping" }]
                })),
            Endpoint::post("/v1/complete")
                .with_description("Legacy text completions")
                .with_headers(self.auth_headers())
                .deprecated(),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicModelsResponse {
    data: Vec<AnthropicModel>,
}

#[derive(Debug, Deserialize)]
struct AnthropicModel {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn list_models(
        &self,
        ctx: &ProbeContext,
        verbose: bool,
    ) -> Result<Vec<Model>, ProviderError> {
        debug!("Listing Anthropic models");

        let request = self.request(
            self.client
                .get(http_probe::join_url(&self.base_url, "/v1/models")?)
                .query(&[("limit", "1000")]),
        );
        let response: AnthropicModelsResponse = http_probe::send_json(ctx, request).await?;

        let mut models = Vec::with_capacity(response.data.len());
        for entry in response.data {
            let mut model = match Model::new(entry.id) {
                Ok(model) => model,
                Err(_) => {
                    warn!("Skipping Anthropic model with empty id");
                    continue;
                }
            };
            if let Some(display_name) = entry.display_name {
                model = model.with_name(display_name);
            }
            model.created_at = entry.created_at;
            models.push(CLAUDE_MODELS.enrich(model));
        }

        if verbose {
            info!("Anthropic returned {} models", models.len());
        }
        Ok(models)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            chat: true,
            agents: true,
            file_upload: true,
            streaming: true,
            vision: true,
            max_requests_per_minute: 4_000,
            max_tokens_per_request: 200_000,
            ..Default::default()
        }
        .with_parameters(&[
            "model",
            "messages",
            "system",
            "max_tokens",
            "temperature",
            "top_p",
            "top_k",
            "stop_sequences",
            "stream",
            "tools",
            "tool_choice",
            "thinking",
        ])
        .with_security_features(&["tls", "api-key-header", "workspace-scoped-keys"])
    }

    fn endpoints(&self) -> EndpointList {
        self.endpoints.get_or_build(|| self.build_endpoints())
    }

    fn prober(&self) -> Result<Arc<dyn EndpointProbe>, ProviderError> {
        Ok(Arc::new(
            HttpProbe::new(self.client.as_ref().clone(), self.base_url.clone())
                .with_policy(StatusPolicy::lenient()),
        ))
    }

    async fn test_model(
        &self,
        ctx: &ProbeContext,
        model_id: &str,
        verbose: bool,
    ) -> Result<(), ProviderError> {
        if model_id.trim().is_empty() {
            return Err(ProviderError::InvalidModel(
                "model id must not be empty".to_string(),
            ));
        }

        let request = self.request(
            self.client
                .post(http_probe::join_url(&self.base_url, "/v1/messages")?)
                .json(&json!({
                    "model": model_id,
                    "max_tokens": 1,
                    "messages": [{ "role": "user", "content": "ping" }]
                })),
        );
        http_probe::send_expect_success(ctx, request).await?;

        if verbose {
            info!("Anthropic accepted a message for model {}", model_id);
        }
        Ok(())
    }
}
