//! End-to-end: configuration file to provider health reports
//!
//! Loads a YAML configuration, registers the built-in adapters alongside a
//! custom one, and validates every configured provider against mock servers.

use std::sync::Arc;
use std::time::Duration;

use apiprism_providers::*;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Backend that answers nothing; every probe waits for the context to stop
struct BlackHoleProvider {
    endpoints: EndpointCache,
}

#[async_trait::async_trait]
impl Provider for BlackHoleProvider {
    fn id(&self) -> &str {
        "blackhole"
    }

    fn name(&self) -> &str {
        "Black Hole"
    }

    async fn list_models(
        &self,
        _ctx: &ProbeContext,
        _verbose: bool,
    ) -> Result<Vec<Model>, ProviderError> {
        Ok(Vec::new())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    fn endpoints(&self) -> EndpointList {
        self.endpoints
            .get_or_build(|| vec![Endpoint::get("/void"), Endpoint::post("/void")])
    }

    fn prober(&self) -> Result<Arc<dyn EndpointProbe>, ProviderError> {
        Ok(probe_fn(|ctx: ProbeContext, _endpoint: Endpoint| async move {
            let reason = ctx.done().await;
            Err::<(), _>(ProviderError::Cancelled(reason))
        }))
    }

    async fn test_model(
        &self,
        _ctx: &ProbeContext,
        model_id: &str,
        _verbose: bool,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::InvalidModel(model_id.to_string()))
    }
}

#[tokio::test]
async fn test_config_to_health_reports() {
    init_tracing();

    let mut openai = mockito::Server::new_async().await;
    let _models = openai
        .mock("GET", "/models")
        .with_status(200)
        .with_body(r#"{"data": [{"id": "gpt-4o", "created": 1715367049}]}"#)
        .create_async()
        .await;
    let _chat = openai
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body("{}")
        .create_async()
        .await;
    let _embeddings = openai
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let mut anthropic = mockito::Server::new_async().await;
    let _anthropic_any = anthropic
        .mock("GET", "/v1/models")
        .with_status(401)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        format!(
            r#"
defaults:
  timeout_secs: 1
providers:
  openai:
    api_key: sk-e2e-openai-key-0000000000
    base_url: {openai}
  anthropic:
    api_key: sk-ant-REDACTED
    base_url: {anthropic}
  blackhole:
    api_key: anything
"#,
            openai = openai.url(),
            anthropic = anthropic.url(),
        ),
    )
    .unwrap();

    let mut config = ConfigurationManager::new();
    config.load_from_file(&path).unwrap();
    config.validate().unwrap();
    let config = config.into_config();

    let registry = Arc::new(ProviderRegistry::new());
    register_builtin_providers(&registry, &config);
    registry.register_provider("blackhole", |_credential| {
        Ok(Arc::new(BlackHoleProvider {
            endpoints: EndpointCache::new(),
        }) as Arc<dyn Provider>)
    });

    let manager = ProviderManager::new(registry, config);
    assert_eq!(
        manager.configured_providers(),
        vec!["anthropic", "blackhole", "openai"]
    );

    let results = tokio::time::timeout(Duration::from_secs(10), manager.validate_all())
        .await
        .expect("validation must finish once deadlines pass");
    assert_eq!(results.len(), 3);

    for (id, result) in &results {
        let health = result.as_ref().unwrap();
        assert_eq!(&health.provider, id);
        assert!(health.endpoints.iter().all(|e| e.status().is_terminal()));

        let report = serde_json::to_value(health).unwrap();
        assert_eq!(report["provider"], id.as_str());
        let text = report.to_string();
        assert!(!text.contains("e2e-openai-key"));
        assert!(!text.contains("e2e-anthropic-key"));

        match id.as_str() {
            "openai" => assert!(health.summary.all_working()),
            "anthropic" => {
                assert_eq!(health.summary.skipped, 1);
                let models = &health.endpoints[0];
                assert!(models.error().contains("authentication failed"));
            }
            "blackhole" => {
                assert!(health.is_down());
                assert!(health
                    .endpoints
                    .iter()
                    .all(|e| e.error().contains("deadline exceeded")));
            }
            other => panic!("unexpected provider {}", other),
        }
    }

    let openai = manager.provider("openai").unwrap();
    let models = openai
        .list_models(&ProbeContext::background(), false)
        .await
        .unwrap();
    assert_eq!(models[0].id, "gpt-4o");
    assert!(models[0].supports_images);
}
