use gistline::catalog::ModelCatalog;
use gistline::config::{CatalogConfig, Config};
use gistline::providers::{ProviderGateway, ProviderId};
use gistline::storage::{FileStore, KeyValueStore, model_cache_key, save_credential};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    if let Some(openai) = config.provider_config_mut(ProviderId::OpenAi) {
        openai.base_url = Some(server.uri());
        openai.api_key = Some("sk-catalog".to_string());
    }
    config
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [
                {"id": "gpt-4o"},
                {"id": "text-embedding-3-small"},
                {"id": "gpt-4o-mini"},
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn refreshed_models_survive_reopen() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let config = openai_config(&server);

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&store_path).await.unwrap());
    let source = Arc::new(vec![ProviderGateway::from_config(ProviderId::OpenAi, &config)]);
    let catalog = ModelCatalog::load(store, source, &CatalogConfig::default()).await;

    assert!(catalog.refresh(ProviderId::OpenAi, Some("sk-catalog")).await);
    assert_eq!(catalog.get(ProviderId::OpenAi), vec!["gpt-4o-mini", "gpt-4o"]);
    assert_eq!(catalog.default_model(ProviderId::OpenAi), "gpt-4o-mini");

    let reopened: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(&store_path).await.unwrap());
    let persisted = reopened
        .get(&model_cache_key(ProviderId::OpenAi))
        .await
        .unwrap();
    assert_eq!(persisted, Some(serde_json::json!(["gpt-4o-mini", "gpt-4o"])));

    let source = Arc::new(Vec::<ProviderGateway>::new());
    let hydrated = ModelCatalog::load(reopened, source, &CatalogConfig::default()).await;
    assert_eq!(hydrated.get(ProviderId::OpenAi), vec!["gpt-4o-mini", "gpt-4o"]);
}

#[tokio::test]
async fn failed_refresh_keeps_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = openai_config(&server);

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path().join("store.json")).await.unwrap());
    let source = Arc::new(vec![ProviderGateway::from_config(ProviderId::OpenAi, &config)]);
    let catalog = ModelCatalog::load(store, source, &CatalogConfig::default()).await;

    assert!(!catalog.refresh(ProviderId::OpenAi, Some("sk-catalog")).await);
    assert_eq!(
        catalog.get(ProviderId::OpenAi),
        ProviderId::OpenAi.descriptor().default_models()
    );
}

#[tokio::test]
async fn scheduled_refreshes_collapse_into_one_request() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = openai_config(&server);

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path().join("store.json")).await.unwrap());
    let source = Arc::new(vec![ProviderGateway::from_config(ProviderId::OpenAi, &config)]);
    let settle = CatalogConfig {
        refresh_debounce_ms: 50,
    };
    let catalog = ModelCatalog::load(store, source, &settle).await;

    for _ in 0..5 {
        catalog.schedule_refresh(ProviderId::OpenAi, Some("sk-catalog".to_string()));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    catalog.settled().await;

    let listings = server.received_requests().await.unwrap().len();
    assert_eq!(listings, 1);
    assert_eq!(catalog.get(ProviderId::OpenAi), vec!["gpt-4o-mini", "gpt-4o"]);
}

#[tokio::test]
async fn saved_key_triggers_refresh_through_store() {
    let server = MockServer::start().await;
    mount_models(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = openai_config(&server);
    if let Some(openai) = config.provider_config_mut(ProviderId::OpenAi) {
        openai.api_key = None;
    }

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path().join("store.json")).await.unwrap());
    let source = Arc::new(vec![ProviderGateway::from_config(ProviderId::OpenAi, &config)]);
    let settle = CatalogConfig {
        refresh_debounce_ms: 20,
    };
    let catalog = ModelCatalog::load(Arc::clone(&store), source, &settle).await;
    let mut follower = catalog.follow_credentials();

    save_credential(store.as_ref(), ProviderId::OpenAi, "sk-catalog")
        .await
        .unwrap();
    assert_eq!(follower.next_edit().await, Some(ProviderId::OpenAi));
    catalog.settled().await;

    assert_eq!(catalog.get(ProviderId::OpenAi), vec!["gpt-4o-mini", "gpt-4o"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
