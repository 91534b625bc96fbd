//! Cloudflare Workers AI provider implementation
//!
//! Credentials arrive as `account_id:api_token`. The model catalog is static;
//! only validation and model tests touch the network.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::{
    context::ProbeContext,
    credential::{self, CompositeCredential},
    error::ProviderError,
    http_probe::{self, HttpProbe, StatusPolicy},
    models::{Endpoint, EndpointCache, EndpointList, Model, ProviderCapabilities},
    provider::Provider,
    validator::EndpointProbe,
};

pub const CLOUDFLARE_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

const CHAT_PROBE_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
const EMBEDDING_PROBE_MODEL: &str = "@cf/baai/bge-base-en-v1.5";

struct CatalogEntry {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    context_window: u64,
    max_output: u64,
    tools: bool,
    images: bool,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "@cf/meta/llama-3.3-70b-instruct-fp8-fast",
        name: "Llama 3.3 70B Instruct (fp8, fast)",
        category: "chat",
        context_window: 24_000,
        max_output: 4_096,
        tools: true,
        images: false,
    },
    CatalogEntry {
        id: "@cf/meta/llama-3.1-8b-instruct",
        name: "Llama 3.1 8B Instruct",
        category: "chat",
        context_window: 7_968,
        max_output: 2_048,
        tools: false,
        images: false,
    },
    CatalogEntry {
        id: "@cf/meta/llama-3.2-11b-vision-instruct",
        name: "Llama 3.2 11B Vision Instruct",
        category: "chat",
        context_window: 128_000,
        max_output: 2_048,
        tools: false,
        images: true,
    },
    CatalogEntry {
        id: "@cf/mistral/mistral-7b-instruct-v0.2-lora",
        name: "Mistral 7B Instruct v0.2 (LoRA)",
        category: "chat",
        context_window: 15_000,
        max_output: 2_048,
        tools: false,
        images: false,
    },
    CatalogEntry {
        id: "@cf/qwen/qwen2.5-coder-32b-instruct",
        name: "Qwen 2.5 Coder 32B Instruct",
        category: "code",
        context_window: 32_768,
        max_output: 4_096,
        tools: false,
        images: false,
    },
    CatalogEntry {
        id: "@cf/baai/bge-base-en-v1.5",
        name: "BGE Base EN v1.5",
        category: "embedding",
        context_window: 512,
        max_output: 0,
        tools: false,
        images: false,
    },
    CatalogEntry {
        id: "@cf/openai/whisper",
        name: "Whisper",
        category: "transcription",
        context_window: 0,
        max_output: 0,
        tools: false,
        images: false,
    },
    CatalogEntry {
        id: "@cf/black-forest-labs/flux-1-schnell",
        name: "FLUX.1 [schnell]",
        category: "image",
        context_window: 0,
        max_output: 0,
        tools: false,
        images: false,
    },
];

impl CatalogEntry {
    fn to_model(&self) -> Result<Model, ProviderError> {
        let mut model = Model::new(self.id)?
            .with_name(self.name)
            .with_limits(self.context_window, self.max_output)
            .with_category(self.category)
            .with_capability("platform", "workers-ai");
        model.supports_tools = self.tools;
        model.supports_images = self.images;
        model.can_stream = matches!(self.category, "chat" | "code");
        Ok(model)
    }
}

/// Cloudflare Workers AI provider implementation
pub struct CloudflareProvider {
    credential: CompositeCredential,
    client: Arc<Client>,
    base_url: String,
    endpoints: EndpointCache,
}

impl CloudflareProvider {
    /// Create a provider from an `account_id:api_token` credential
    pub fn new(credential: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(credential, CLOUDFLARE_BASE_URL)
    }

    pub fn with_base_url(credential: &str, base_url: &str) -> Result<Self, ProviderError> {
        Self::with_client(Arc::new(Client::new()), credential, base_url)
    }

    pub fn with_client(
        client: Arc<Client>,
        credential: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let credential = credential::split_composite(credential, "Cloudflare")?;
        Ok(Self {
            credential,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: EndpointCache::new(),
        })
    }

    pub fn account_id(&self) -> &str {
        &self.credential.id
    }

    fn get_auth_header(&self) -> String {
        format!("Bearer {}", self.credential.secret)
    }

    fn run_path(&self, model_id: &str) -> String {
        format!("/accounts/{}/ai/run/{}", self.credential.id, model_id)
    }

    fn build_endpoints(&self) -> Vec<Endpoint> {
        let auth = self.get_auth_header();
        let search_path = format!("/accounts/{}/ai/models/search", self.credential.id);
        vec![
            Endpoint::get("/user/tokens/verify")
                .with_description("Verify API token")
                .with_header("Authorization", auth.clone()),
            Endpoint::get(search_path)
                .with_description("Search Workers AI model catalog")
                .with_header("Authorization", auth.clone()),
            Endpoint::post(self.run_path(CHAT_PROBE_MODEL))
                .with_description("Run text generation model")
                .with_header("Authorization", auth.clone())
                .with_test_params(json!({
                    "messages": [{ "role": "user", "content": "ping" }],
                    "max_tokens": 1
                })),
            Endpoint::post(self.run_path(EMBEDDING_PROBE_MODEL))
                .with_description("Run text embedding model")
                .with_header("Authorization", auth)
                .with_test_params(json!({ "text": ["ping"] })),
        ]
    }
}

#[async_trait]
impl Provider for CloudflareProvider {
    fn id(&self) -> &str {
        "cloudflare"
    }

    fn name(&self) -> &str {
        "Cloudflare Workers AI"
    }

    async fn list_models(
        &self,
        ctx: &ProbeContext,
        verbose: bool,
    ) -> Result<Vec<Model>, ProviderError> {
        if let Some(reason) = ctx.stop_reason() {
            return Err(ProviderError::Cancelled(reason));
        }

        let models = CATALOG
            .iter()
            .map(CatalogEntry::to_model)
            .collect::<Result<Vec<_>, _>>()?;

        if verbose {
            info!("Cloudflare catalog lists {} models", models.len());
        } else {
            debug!("Cloudflare catalog lists {} models", models.len());
        }
        Ok(models)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            chat: true,
            embeddings: true,
            streaming: true,
            vision: true,
            audio: true,
            max_requests_per_minute: 300,
            max_tokens_per_request: 24_000,
            ..Default::default()
        }
        .with_parameters(&[
            "messages",
            "prompt",
            "max_tokens",
            "temperature",
            "top_p",
            "top_k",
            "seed",
            "stream",
        ])
        .with_security_features(&["tls", "bearer-auth", "account-scoped-tokens"])
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

        let payload = if model_id.contains("bge") || model_id.contains("embed") {
            json!({ "text": ["ping"] })
        } else {
            json!({
                "messages": [{ "role": "user", "content": "ping" }],
                "max_tokens": 1
            })
        };

        let url = http_probe::join_url(&self.base_url, &self.run_path(model_id))?;
        let request = self
            .client
            .post(url)
            .header("Authorization", self.get_auth_header())
            .json(&payload);
        http_probe::send_expect_success(ctx, request).await?;

        if verbose {
            info!("Cloudflare ran model {}", model_id);
        }
        Ok(())
    }
}
