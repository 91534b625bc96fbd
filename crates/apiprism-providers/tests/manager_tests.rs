//! Provider manager wired to the built-in adapters

use std::sync::Arc;

use apiprism_providers::*;

fn config_for(server_url: &str) -> ProvidersConfig {
    let mut config = ProvidersConfig::default();
    config.defaults.timeout_secs = 5;
    config.providers.insert(
        "openai".to_string(),
        ProviderSettings {
            api_key: Some("sk-manager-test-key-000000".to_string()),
            base_url: Some(server_url.to_string()),
            timeout_secs: None,
        },
    );
    config
}

fn manager(server_url: &str) -> ProviderManager {
    let config = config_for(server_url);
    let registry = Arc::new(ProviderRegistry::new());
    register_builtin_providers(&registry, &config);
    ProviderManager::new(registry, config)
}

#[tokio::test]
async fn test_validate_configured_provider() {
    let mut server = mockito::Server::new_async().await;
    let _models = server
        .mock("GET", "/models")
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;
    let _chat = server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body(r#"{"error": {"message": "max_tokens too small"}}"#)
        .create_async()
        .await;
    let _embeddings = server
        .mock("POST", "/embeddings")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let manager = manager(&server.url());
    let health = manager.validate("openai").await.unwrap();

    assert_eq!(health.provider, "openai");
    assert_eq!(health.summary.total, 3);
    assert_eq!(health.summary.working, 2);
    assert_eq!(health.summary.failed, 1);
    assert!(!health.is_down());
    assert_eq!(health.endpoints[2].status(), EndpointStatus::Failed);

    // Reports serialize without leaking the bearer header.
    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"failed\""));
    assert!(!json.contains("sk-manager-test-key"));
}

#[tokio::test]
async fn test_validate_all_only_touches_configured_providers() {
    let mut server = mockito::Server::new_async().await;
    let _any = server
        .mock("GET", "/models")
        .with_status(500)
        .create_async()
        .await;

    let manager = manager(&server.url());
    assert_eq!(manager.configured_providers(), vec!["openai"]);

    let results = manager.validate_all().await;
    assert_eq!(results.len(), 1);
    let (id, health) = &results[0];
    assert_eq!(id, "openai");
    assert!(health.as_ref().unwrap().is_down());
}

#[tokio::test]
async fn test_unconfigured_provider_is_rejected() {
    let manager = manager("http://127.0.0.1:9");
    let err = manager.validate("anthropic").await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidCredential(_)));

    let err = manager.validate("nonexistent").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_model_through_manager() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let manager = manager(&server.url());
    manager.test_model("openai", "gpt-4o-mini").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_shutdown_cancels_passes() {
    let manager = manager("http://127.0.0.1:9");
    manager.shutdown();

    let health = manager.validate("openai").await.unwrap();
    assert_eq!(health.summary.failed, health.summary.total);
    assert!(health
        .endpoints
        .iter()
        .all(|e| e.error().contains("context canceled")));
}
