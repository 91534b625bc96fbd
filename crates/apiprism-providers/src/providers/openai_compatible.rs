//! OpenAI-compatible provider implementation
//!
//! OpenAI, Mistral, Groq, DeepSeek and Together all expose the same
//! `/models`, `/chat/completions` and `/embeddings` surface behind bearer
//! authentication, so one adapter covers them with a per-vendor preset.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
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

/// Vendors served by [`OpenAiCompatibleProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenAiCompatibleKind {
    OpenAi,
    Mistral,
    Groq,
    DeepSeek,
    Together,
}

impl OpenAiCompatibleKind {
    pub const ALL: [OpenAiCompatibleKind; 5] = [
        OpenAiCompatibleKind::OpenAi,
        OpenAiCompatibleKind::Mistral,
        OpenAiCompatibleKind::Groq,
        OpenAiCompatibleKind::DeepSeek,
        OpenAiCompatibleKind::Together,
    ];

    /// Registry key
    pub fn id(&self) -> &'static str {
        match self {
            OpenAiCompatibleKind::OpenAi => "openai",
            OpenAiCompatibleKind::Mistral => "mistral",
            OpenAiCompatibleKind::Groq => "groq",
            OpenAiCompatibleKind::DeepSeek => "deepseek",
            OpenAiCompatibleKind::Together => "together",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OpenAiCompatibleKind::OpenAi => "OpenAI",
            OpenAiCompatibleKind::Mistral => "Mistral AI",
            OpenAiCompatibleKind::Groq => "Groq",
            OpenAiCompatibleKind::DeepSeek => "DeepSeek",
            OpenAiCompatibleKind::Together => "Together AI",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            OpenAiCompatibleKind::OpenAi => "https://api.openai.com/v1",
            OpenAiCompatibleKind::Mistral => "https://api.mistral.ai/v1",
            OpenAiCompatibleKind::Groq => "https://api.groq.com/openai/v1",
            OpenAiCompatibleKind::DeepSeek => "https://api.deepseek.com/v1",
            OpenAiCompatibleKind::Together => "https://api.together.xyz/v1",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Model used for the synthetic chat probe
    fn probe_chat_model(&self) -> &'static str {
        match self {
            OpenAiCompatibleKind::OpenAi => "gpt-4o-mini",
            OpenAiCompatibleKind::Mistral => "mistral-small-latest",
            OpenAiCompatibleKind::Groq => "llama-3.1-8b-instant",
            OpenAiCompatibleKind::DeepSeek => "deepseek-chat",
            OpenAiCompatibleKind::Together => "meta-llama/Llama-3.2-3B-Instruct-Turbo",
        }
    }

    /// Model used for the synthetic embeddings probe, when the vendor offers embeddings
    fn probe_embedding_model(&self) -> Option<&'static str> {
        match self {
            OpenAiCompatibleKind::OpenAi => Some("text-embedding-3-small"),
            OpenAiCompatibleKind::Mistral => Some("mistral-embed"),
            OpenAiCompatibleKind::Together => Some("togethercomputer/m2-bert-80M-8k-retrieval"),
            OpenAiCompatibleKind::Groq | OpenAiCompatibleKind::DeepSeek => None,
        }
    }

    /// Static capabilities of the vendor
    pub fn capabilities(&self) -> ProviderCapabilities {
        let base = ProviderCapabilities {
            chat: true,
            streaming: true,
            json_mode: true,
            ..Default::default()
        }
        .with_security_features(&["tls", "bearer-auth"]);

        match self {
            OpenAiCompatibleKind::OpenAi => ProviderCapabilities {
                embeddings: true,
                fine_tuning: true,
                agents: true,
                file_upload: true,
                vision: true,
                audio: true,
                max_requests_per_minute: 10_000,
                max_tokens_per_request: 128_000,
                ..base
            }
            .with_parameters(&[
                "model",
                "messages",
                "temperature",
                "top_p",
                "max_tokens",
                "stream",
                "tools",
                "tool_choice",
                "response_format",
                "seed",
            ])
            .with_security_features(&["tls", "bearer-auth", "project-scoped-keys"]),
            OpenAiCompatibleKind::Mistral => ProviderCapabilities {
                fim: true,
                embeddings: true,
                fine_tuning: true,
                agents: true,
                file_upload: true,
                vision: true,
                max_requests_per_minute: 300,
                max_tokens_per_request: 128_000,
                ..base
            }
            .with_parameters(&[
                "model",
                "messages",
                "temperature",
                "top_p",
                "max_tokens",
                "stream",
                "safe_prompt",
                "random_seed",
                "tools",
                "response_format",
            ]),
            OpenAiCompatibleKind::Groq => ProviderCapabilities {
                audio: true,
                max_requests_per_minute: 30,
                max_tokens_per_request: 32_768,
                ..base
            }
            .with_parameters(&[
                "model",
                "messages",
                "temperature",
                "top_p",
                "max_tokens",
                "stream",
                "tools",
            ]),
            OpenAiCompatibleKind::DeepSeek => ProviderCapabilities {
                fim: true,
                max_requests_per_minute: 60,
                max_tokens_per_request: 64_000,
                ..base
            }
            .with_parameters(&[
                "model",
                "messages",
                "temperature",
                "top_p",
                "max_tokens",
                "stream",
                "tools",
            ]),
            OpenAiCompatibleKind::Together => ProviderCapabilities {
                embeddings: true,
                fine_tuning: true,
                vision: true,
                max_requests_per_minute: 600,
                max_tokens_per_request: 32_768,
                ..base
            }
            .with_parameters(&[
                "model",
                "messages",
                "temperature",
                "top_p",
                "top_k",
                "max_tokens",
                "stream",
            ]),
        }
    }

    fn enrichment(&self) -> &'static EnrichmentTable {
        match self {
            OpenAiCompatibleKind::OpenAi => &OPENAI_MODELS,
            OpenAiCompatibleKind::Mistral => &MISTRAL_MODELS,
            OpenAiCompatibleKind::Groq => &GROQ_MODELS,
            OpenAiCompatibleKind::DeepSeek => &DEEPSEEK_MODELS,
            OpenAiCompatibleKind::Together => &TOGETHER_MODELS,
        }
    }

    /// Fill static metadata for a discovered model
    pub fn enrich(&self, model: Model) -> Model {
        self.enrichment().enrich(model)
    }
}

const EMBEDDING: ModelProfile = ModelProfile::chat(0.02, 0.0, 8_192, 0)
    .without_tools()
    .with_categories(&["embedding"]);

static OPENAI_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "^gpt-4o-mini",
                ModelProfile::chat(0.15, 0.6, 128_000, 16_384).with_images(),
            ),
            (
                "^gpt-4o",
                ModelProfile::chat(2.5, 10.0, 128_000, 16_384).with_images(),
            ),
            (
                "^gpt-4\\.1",
                ModelProfile::chat(2.0, 8.0, 1_047_576, 32_768)
                    .with_images(),
            ),
            (
                "^o[134]",
                ModelProfile::chat(1.1, 4.4, 200_000, 100_000)
                    .with_images()
                    .with_reasoning()
                    .with_categories(&["chat", "reasoning"]),
            ),
            ("^gpt-3\\.5", ModelProfile::chat(0.5, 1.5, 16_385, 4_096)),
            ("embedding", EMBEDDING),
            (
                "^(whisper|tts)",
                ModelProfile::chat(0.0, 0.0, 0, 0)
                    .without_tools()
                    .with_categories(&["audio"]),
            ),
            (
                "^(dall-e|gpt-image)",
                ModelProfile::chat(0.0, 0.0, 0, 0)
                    .without_tools()
                    .with_categories(&["image"]),
            ),
        ],
        ModelProfile::chat(0.0, 0.0, 8_192, 4_096),
    )
});

static MISTRAL_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "^codestral",
                ModelProfile::chat(0.3, 0.9, 256_000, 8_192)
                    .with_categories(&["chat", "code", "fim"]),
            ),
            (
                "^pixtral",
                ModelProfile::chat(2.0, 6.0, 128_000, 8_192).with_images(),
            ),
            (
                "^magistral",
                ModelProfile::chat(2.0, 5.0, 40_000, 40_000)
                    .with_reasoning()
                    .with_categories(&["chat", "reasoning"]),
            ),
            (
                "^mistral-large",
                ModelProfile::chat(2.0, 6.0, 128_000, 8_192),
            ),
            (
                "^mistral-small",
                ModelProfile::chat(0.1, 0.3, 32_000, 8_192),
            ),
            ("embed", EMBEDDING),
        ],
        ModelProfile::chat(0.25, 0.25, 32_000, 8_192),
    )
});

static GROQ_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "whisper",
                ModelProfile::chat(0.0, 0.0, 0, 0)
                    .without_tools()
                    .with_categories(&["audio", "transcription"]),
            ),
            (
                "llama-3\\.3-70b",
                ModelProfile::chat(0.59, 0.79, 131_072, 32_768),
            ),
            (
                "llama-3\\.1-8b",
                ModelProfile::chat(0.05, 0.08, 131_072, 8_192),
            ),
            (
                "deepseek-r1|qwq",
                ModelProfile::chat(0.75, 0.99, 131_072, 16_384)
                    .with_reasoning()
                    .with_categories(&["chat", "reasoning"]),
            ),
        ],
        ModelProfile::chat(0.2, 0.2, 8_192, 8_192),
    )
});

static DEEPSEEK_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "reasoner",
                ModelProfile::chat(0.55, 2.19, 64_000, 8_192)
                    .without_tools()
                    .with_reasoning()
                    .with_categories(&["chat", "reasoning"]),
            ),
            (
                "coder",
                ModelProfile::chat(0.27, 1.1, 64_000, 8_192)
                    .with_categories(&["chat", "code", "fim"]),
            ),
            ("chat", ModelProfile::chat(0.27, 1.1, 64_000, 8_192)),
        ],
        ModelProfile::chat(0.27, 1.1, 64_000, 8_192),
    )
});

static TOGETHER_MODELS: Lazy<EnrichmentTable> = Lazy::new(|| {
    EnrichmentTable::new(
        &[
            (
                "vision",
                ModelProfile::chat(0.18, 0.18, 131_072, 4_096).with_images(),
            ),
            (
                "llama-3\\.3-70b",
                ModelProfile::chat(0.88, 0.88, 131_072, 4_096),
            ),
            (
                "llama-3\\.2-3b",
                ModelProfile::chat(0.06, 0.06, 131_072, 4_096),
            ),
            ("bert|bge|embed", EMBEDDING),
            (
                "flux|stable-diffusion",
                ModelProfile::chat(0.0, 0.0, 0, 0)
                    .without_tools()
                    .with_categories(&["image"]),
            ),
        ],
        ModelProfile::chat(0.2, 0.2, 8_192, 4_096),
    )
});

/// Adapter for vendors exposing the OpenAI REST surface
pub struct OpenAiCompatibleProvider {
    kind: OpenAiCompatibleKind,
    api_key: String,
    client: Arc<Client>,
    base_url: String,
    endpoints: EndpointCache,
}

impl OpenAiCompatibleProvider {
    /// Create a provider for `kind` against the vendor's public API
    pub fn new(kind: OpenAiCompatibleKind, api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(kind, api_key, kind.default_base_url())
    }

    /// Create a provider with a custom base URL (proxy, gateway, test server)
    pub fn with_base_url(
        kind: OpenAiCompatibleKind,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        Self::with_client(Arc::new(Client::new()), kind, api_key, base_url)
    }

    /// Create a provider with a custom HTTP client and base URL
    pub fn with_client(
        client: Arc<Client>,
        kind: OpenAiCompatibleKind,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let api_key = credential::require(api_key, kind.display_name())?;

        Ok(Self {
            kind,
            api_key: api_key.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: EndpointCache::new(),
        })
    }

    pub fn kind(&self) -> OpenAiCompatibleKind {
        self.kind
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn build_endpoints(&self) -> Vec<Endpoint> {
        let auth = self.get_auth_header();
        let mut endpoints = vec![
            Endpoint::get("/models")
                .with_description("List available models")
                .with_header("Authorization", auth.clone()),
            Endpoint::post("/chat/completions")
                .with_description("Chat completion")
                .with_header("Authorization", auth.clone())
                .with_test_params(json!({
                    "model": self.kind.probe_chat_model(),
                    "messages": [{ "role": "user", "content": "ping" }],
                    "max_tokens": 1
                })),
        ];

        if let Some(model) = self.kind.probe_embedding_model() {
            endpoints.push(
                Endpoint::post("/embeddings")
                    .with_description("Text embeddings")
                    .with_header("Authorization", auth.clone())
                    .with_test_params(json!({ "model": model, "input": "ping" })),
            );
        }

        if self.kind == OpenAiCompatibleKind::Mistral {
            endpoints.push(
                Endpoint::post("/fim/completions")
                    .with_description("Fill-in-the-middle completion")
                    .with_header("Authorization", auth)
                    .with_test_params(json!({
                        "model": "codestral-latest",
                        "prompt": "def ",
                        "suffix": "",
                        "max_tokens": 1
                    })),
            );
        }

        endpoints
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    id: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    owned_by: Option<String>,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn id(&self) -> &str {
        self.kind.id()
    }

    fn name(&self) -> &str {
        self.kind.display_name()
    }

    async fn list_models(
        &self,
        ctx: &ProbeContext,
        verbose: bool,
    ) -> Result<Vec<Model>, ProviderError> {
        debug!("Listing models for provider: {}", self.id());

        let request = self
            .client
            .get(http_probe::join_url(&self.base_url, "/models")?)
            .header("Authorization", self.get_auth_header());
        let response: ModelsResponse = http_probe::send_json(ctx, request).await?;

        let mut models = Vec::with_capacity(response.data.len());
        for api_model in response.data {
            let model = match Model::new(api_model.id) {
                Ok(model) => model,
                Err(_) => {
                    warn!("Skipping model with empty id from {}", self.id());
                    continue;
                }
            };
            let model = match api_model.created {
                Some(created) => model.with_created_unix(created),
                None => model,
            };
            let model = match api_model.owned_by {
                Some(owner) => model.with_capability("owned_by", owner),
                None => model,
            };
            models.push(self.kind.enrich(model));
        }

        if verbose {
            info!("{} returned {} models", self.name(), models.len());
        }
        Ok(models)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.kind.capabilities()
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

        let (path, payload) = if model_id.contains("embed") {
            ("/embeddings", json!({ "model": model_id, "input": "ping" }))
        } else {
            (
                "/chat/completions",
                json!({
                    "model": model_id,
                    "messages": [{ "role": "user", "content": "ping" }],
                    "max_tokens": 1
                }),
            )
        };

        let request = self
            .client
            .post(http_probe::join_url(&self.base_url, path)?)
            .header("Authorization", self.get_auth_header())
            .json(&payload);
        http_probe::send_expect_success(ctx, request).await?;

        if verbose {
            info!("{} accepted a request for model {}", self.name(), model_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    #[test]
    fn test_provider_creation_empty_key() {
        let provider = OpenAiCompatibleProvider::new(OpenAiCompatibleKind::OpenAi, "");
        assert!(matches!(provider, Err(ProviderError::InvalidCredential(_))));
    }

    #[test]
    fn test_provider_ids() {
        for kind in OpenAiCompatibleKind::ALL {
            let provider = OpenAiCompatibleProvider::new(kind, "test-key").unwrap();
            assert_eq!(provider.id(), kind.id());
            assert_eq!(OpenAiCompatibleKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(OpenAiCompatibleKind::from_id("nope"), None);
    }

    #[test]
    fn test_endpoints_carry_auth_header() {
        let kind = OpenAiCompatibleKind::Groq;
        let provider = OpenAiCompatibleProvider::new(kind, "gsk-test").unwrap();
        let endpoints = provider.endpoints().snapshot();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].method(), HttpMethod::Get);
        for endpoint in &endpoints {
            assert!(endpoint
                .headers()
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer gsk-test"));
        }
    }

    #[test]
    fn test_mistral_declares_fim_endpoint() {
        let kind = OpenAiCompatibleKind::Mistral;
        let provider = OpenAiCompatibleProvider::new(kind, "key").unwrap();
        let paths: Vec<String> = provider
            .endpoints()
            .snapshot()
            .iter()
            .map(|e| e.path().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/models",
                "/chat/completions",
                "/embeddings",
                "/fim/completions",
            ]
        );
        assert!(provider.capabilities().fim);
    }

    #[test]
    fn test_enrichment_is_deterministic() {
        let kind = OpenAiCompatibleKind::OpenAi;
        let a = kind.enrich(Model::new("gpt-4o-2024-08-06").unwrap());
        let b = kind.enrich(Model::new("gpt-4o-2024-08-06").unwrap());
        assert_eq!(a, b);
        assert!(a.supports_images);
        assert_eq!(a.context_window, 128_000);
    }

    #[test]
    fn test_reasoning_models_are_flagged() {
        let kind = OpenAiCompatibleKind::OpenAi;
        let model = kind.enrich(Model::new("o3-mini").unwrap());
        assert!(model.can_reason);
        assert_eq!(model.categories, vec!["chat", "reasoning"]);
    }
}
