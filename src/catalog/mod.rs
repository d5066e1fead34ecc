//! Discovered model lists per provider, with debounced refresh.
//!
//! Readers always get a complete list: the cache is an [`ArcSwap`] map whose
//! lists are replaced wholesale, and a provider with nothing discovered falls
//! back to its descriptor defaults.

pub mod selector;

use crate::config::CatalogConfig;
use crate::error::ProviderError;
use crate::providers::{Provider, ProviderGateway, ProviderId};
use crate::storage::{
    KeyValueStore, credential_provider, get_json, load_credential, model_cache_key, set_json,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Where fresh model lists come from.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn discover(
        &self,
        provider: ProviderId,
        credential: Option<&str>,
    ) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
impl ModelSource for ProviderGateway {
    async fn discover(
        &self,
        provider: ProviderId,
        credential: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        if provider != self.id() {
            return Err(ProviderError::UnknownProvider(provider.to_string()));
        }
        self.list_models(credential).await
    }
}

#[async_trait]
impl ModelSource for Vec<ProviderGateway> {
    async fn discover(
        &self,
        provider: ProviderId,
        credential: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        let gateway = self
            .iter()
            .find(|gateway| gateway.id() == provider)
            .ok_or_else(|| ProviderError::UnknownProvider(provider.to_string()))?;
        gateway.list_models(credential).await
    }
}

type ModelMap = HashMap<ProviderId, Arc<Vec<String>>>;

/// Debounce slot for one provider. It stays occupied from scheduling until
/// the refresh it started has been applied, so aborting `handle` cancels a
/// discovery that is already running.
struct PendingRefresh {
    generation: u64,
    handle: JoinHandle<()>,
}

struct CatalogInner {
    cache: ArcSwap<ModelMap>,
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn ModelSource>,
    settle: Duration,
    pending: Mutex<HashMap<ProviderId, PendingRefresh>>,
    generation: AtomicU64,
    idle: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ModelCatalog {
    inner: Arc<CatalogInner>,
}

impl ModelCatalog {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn ModelSource>,
        settle: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                cache: ArcSwap::from_pointee(HashMap::new()),
                store,
                source,
                settle,
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                idle: watch::channel(true).0,
            }),
        }
    }

    /// Build a catalog and hydrate it from `store`. Unreadable entries are
    /// logged and left to the descriptor defaults.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn ModelSource>,
        config: &CatalogConfig,
    ) -> Self {
        let catalog = Self::new(
            store,
            source,
            Duration::from_millis(config.refresh_debounce_ms),
        );

        let mut loaded = ModelMap::new();
        for provider in ProviderId::all() {
            let key = model_cache_key(provider);
            match get_json::<Vec<String>>(catalog.inner.store.as_ref(), &key).await {
                Ok(Some(models)) if !models.is_empty() => {
                    loaded.insert(provider, Arc::new(models));
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(%provider, "ignoring cached model list: {err}"),
            }
        }
        tracing::debug!(providers = loaded.len(), "model cache hydrated");
        catalog.inner.cache.store(Arc::new(loaded));
        catalog
    }

    /// Cached list for `provider`, or its defaults. Never empty.
    pub fn get(&self, provider: ProviderId) -> Vec<String> {
        self.inner.get(provider)
    }

    pub fn default_model(&self, provider: ProviderId) -> String {
        selector::pick(&self.get(provider), provider)
    }

    /// Discover models now. Returns whether the cached list was replaced.
    pub async fn refresh(&self, provider: ProviderId, credential: Option<&str>) -> bool {
        let Some(models) = self.inner.discover(provider, credential).await else {
            return false;
        };
        self.inner.swap_in(provider, models);
        self.inner.persist(provider).await;
        true
    }

    /// Debounced [`refresh`](Self::refresh): each call restarts the settle
    /// timer for `provider` and cancels any refresh it had already started,
    /// so the last credential always wins.
    pub fn schedule_refresh(&self, provider: ProviderId, credential: Option<String>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        let mut pending = self.inner.lock_pending();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.settle).await;
            inner.run_scheduled(provider, credential.as_deref(), generation).await;
        });

        if let Some(previous) = pending.insert(provider, PendingRefresh { generation, handle }) {
            previous.handle.abort();
            tracing::trace!(%provider, "debounced model refresh");
        }
        self.inner.idle.send_replace(false);
    }

    /// Resolves once no scheduled refresh is waiting or running.
    pub async fn settled(&self) {
        let mut idle = self.inner.idle.subscribe();
        // the sender lives in `self.inner`, so this cannot fail
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Schedule a refresh whenever a `credentials:<provider>` key changes in
    /// the catalog's store, using the stored key. Stops when the returned
    /// [`CredentialFollower`] is dropped.
    pub fn follow_credentials(&self) -> CredentialFollower {
        let mut changes = self.inner.store.subscribe();
        let (edits, edit_rx) = watch::channel(None);
        let catalog = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let key = match changes.recv().await {
                    Ok(key) => key,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "credential follower fell behind store changes");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(provider) = credential_provider(&key) else {
                    continue;
                };

                let credential = match load_credential(catalog.inner.store.as_ref(), provider).await {
                    Ok(credential) => credential,
                    Err(err) => {
                        tracing::warn!(%provider, "unreadable stored credential: {err}");
                        None
                    }
                };
                tracing::debug!(%provider, "credential changed");
                catalog.schedule_refresh(provider, credential);
                edits.send_replace(Some(provider));
            }
        });

        CredentialFollower { task, edits: edit_rx }
    }
}

/// Handle for [`ModelCatalog::follow_credentials`].
pub struct CredentialFollower {
    task: JoinHandle<()>,
    edits: watch::Receiver<Option<ProviderId>>,
}

impl CredentialFollower {
    /// Wait until the next credential edit has been turned into a scheduled
    /// refresh, and return its provider.
    pub async fn next_edit(&mut self) -> Option<ProviderId> {
        self.edits.changed().await.ok()?;
        *self.edits.borrow_and_update()
    }
}

impl Drop for CredentialFollower {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl CatalogInner {
    fn get(&self, provider: ProviderId) -> Vec<String> {
        self.cache
            .load()
            .get(&provider)
            .filter(|models| !models.is_empty())
            .map_or_else(
                || provider.descriptor().default_models(),
                |models| Vec::clone(models),
            )
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<ProviderId, PendingRefresh>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Body of a scheduled refresh once its timer has fired. The result is
    /// applied only while slot `generation` is still the current one.
    async fn run_scheduled(&self, provider: ProviderId, credential: Option<&str>, generation: u64) {
        let discovered = self.discover(provider, credential).await;

        {
            let mut pending = self.lock_pending();
            if !pending
                .get(&provider)
                .is_some_and(|entry| entry.generation == generation)
            {
                tracing::debug!(%provider, "dropping superseded model refresh");
                return;
            }
            pending.remove(&provider);
            if let Some(models) = &discovered {
                self.swap_in(provider, Arc::clone(models));
            }
            self.idle.send_replace(pending.is_empty());
        }

        if discovered.is_some() {
            self.persist(provider).await;
        }
    }

    async fn discover(&self, provider: ProviderId, credential: Option<&str>) -> Option<Arc<Vec<String>>> {
        match self.source.discover(provider, credential).await {
            Ok(models) if models.is_empty() => {
                tracing::info!(%provider, "model discovery returned nothing; keeping cache");
                None
            }
            Ok(models) => Some(Arc::new(models)),
            Err(err) => {
                tracing::warn!(%provider, "model discovery failed: {err}");
                None
            }
        }
    }

    fn swap_in(&self, provider: ProviderId, models: Arc<Vec<String>>) {
        let count = models.len();
        self.cache.rcu(|current| {
            let mut next = ModelMap::clone(current);
            next.insert(provider, Arc::clone(&models));
            next
        });
        tracing::info!(%provider, count, "model cache replaced");
    }

    /// Write the current cached list, so the newest list also wins on disk.
    async fn persist(&self, provider: ProviderId) {
        let Some(models) = self.cache.load().get(&provider).cloned() else {
            return;
        };
        if let Err(err) = set_json(self.store.as_ref(), &model_cache_key(provider), models.as_ref()).await
        {
            tracing::warn!(%provider, "failed to persist model list: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, save_credential};
    use tokio::time::Instant;

    struct Call {
        provider: ProviderId,
        credential: Option<String>,
        at: Instant,
    }

    struct CountingSource {
        result: Mutex<Result<Vec<String>, u16>>,
        calls: Mutex<Vec<Call>>,
    }

    impl CountingSource {
        fn returning(models: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Ok(models.iter().map(ToString::to_string).collect())),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn set_result(&self, result: Result<Vec<String>, u16>) {
            *self.result.lock().unwrap() = result;
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelSource for CountingSource {
        async fn discover(
            &self,
            provider: ProviderId,
            credential: Option<&str>,
        ) -> Result<Vec<String>, ProviderError> {
            self.calls.lock().unwrap().push(Call {
                provider,
                credential: credential.map(ToString::to_string),
                at: Instant::now(),
            });
            self.result
                .lock()
                .unwrap()
                .clone()
                .map_err(|status| ProviderError::Transport {
                    provider: provider.to_string(),
                    status: Some(status),
                    body: "unavailable".into(),
                })
        }
    }

    /// Answers `model-from-<credential>-key`, taking as long as the
    /// credential's configured delay.
    struct KeyedSource {
        delays: HashMap<&'static str, Duration>,
    }

    #[async_trait]
    impl ModelSource for KeyedSource {
        async fn discover(
            &self,
            _provider: ProviderId,
            credential: Option<&str>,
        ) -> Result<Vec<String>, ProviderError> {
            let credential = credential.unwrap_or_default();
            if let Some(delay) = self.delays.get(credential) {
                tokio::time::sleep(*delay).await;
            }
            Ok(vec![format!("model-from-{credential}-key")])
        }
    }

    fn catalog(source: Arc<CountingSource>, store: Arc<MemoryStore>) -> ModelCatalog {
        ModelCatalog::new(store, source, Duration::from_millis(1000))
    }

    #[test]
    fn empty_cache_returns_defaults() {
        let catalog = catalog(CountingSource::returning(&[]), Arc::new(MemoryStore::new()));
        for provider in ProviderId::all() {
            let models = catalog.get(provider);
            assert!(!models.is_empty());
            assert_eq!(models, provider.descriptor().default_models());
        }
        assert_eq!(catalog.default_model(ProviderId::OpenAi), "gpt-4o-mini");
        assert_eq!(catalog.default_model(ProviderId::OnDevice), "on-device");
    }

    #[tokio::test]
    async fn successful_refresh_replaces_and_persists() {
        let source = CountingSource::returning(&["gpt-4o", "gpt-4.1-mini"]);
        let store = Arc::new(MemoryStore::new());
        let catalog = catalog(source, Arc::clone(&store));

        assert!(catalog.refresh(ProviderId::OpenAi, Some("sk-a")).await);
        assert_eq!(catalog.get(ProviderId::OpenAi), vec!["gpt-4o", "gpt-4.1-mini"]);
        assert_eq!(catalog.default_model(ProviderId::OpenAi), "gpt-4.1-mini");

        let persisted: Option<Vec<String>> = get_json(store.as_ref(), "models:openai").await.unwrap();
        assert_eq!(persisted.unwrap(), vec!["gpt-4o", "gpt-4.1-mini"]);
    }

    #[tokio::test]
    async fn failed_or_empty_refresh_keeps_cache() {
        let source = CountingSource::returning(&["claude-3-opus-20240229"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));
        assert!(catalog.refresh(ProviderId::Anthropic, Some("sk-ant-a")).await);

        source.set_result(Err(500));
        assert!(!catalog.refresh(ProviderId::Anthropic, Some("sk-ant-a")).await);
        assert_eq!(catalog.get(ProviderId::Anthropic), vec!["claude-3-opus-20240229"]);

        source.set_result(Ok(Vec::new()));
        assert!(!catalog.refresh(ProviderId::Anthropic, Some("sk-ant-a")).await);
        assert_eq!(catalog.get(ProviderId::Anthropic), vec!["claude-3-opus-20240229"]);
    }

    #[tokio::test]
    async fn load_hydrates_and_skips_corrupt_entries() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("models:gemini", serde_json::json!(["gemini-2.5-flash"]))
            .await
            .unwrap();
        store
            .set("models:openai", serde_json::json!({"broken": true}))
            .await
            .unwrap();

        let catalog = ModelCatalog::load(
            store,
            CountingSource::returning(&[]),
            &CatalogConfig::default(),
        )
        .await;
        assert_eq!(catalog.get(ProviderId::Gemini), vec!["gemini-2.5-flash"]);
        assert_eq!(
            catalog.get(ProviderId::OpenAi),
            ProviderId::OpenAi.descriptor().default_models()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_refreshes_once_with_last_credential() {
        let source = CountingSource::returning(&["gpt-4o-mini"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));
        let start = Instant::now();

        for i in 0..5 {
            catalog.schedule_refresh(ProviderId::OpenAi, Some(format!("sk-key-{i}")));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(source.call_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].provider, ProviderId::OpenAi);
        assert_eq!(calls[0].credential.as_deref(), Some("sk-key-4"));
        assert_eq!(calls[0].at - start, Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn providers_debounce_independently() {
        let source = CountingSource::returning(&["model-a"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));

        catalog.schedule_refresh(ProviderId::OpenAi, Some("sk-1".into()));
        catalog.schedule_refresh(ProviderId::Gemini, Some("AIza-1".into()));
        catalog.schedule_refresh(ProviderId::OpenAi, Some("sk-2".into()));

        tokio::time::sleep(Duration::from_secs(2)).await;

        let calls = source.calls.lock().unwrap();
        let mut seen: Vec<_> = calls
            .iter()
            .map(|c| (c.provider, c.credential.clone().unwrap()))
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (ProviderId::OpenAi, "sk-2".to_string()),
                (ProviderId::Gemini, "AIza-1".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_restarts_on_each_change() {
        let source = CountingSource::returning(&["model-a"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));

        catalog.schedule_refresh(ProviderId::Anthropic, None);
        tokio::time::sleep(Duration::from_millis(900)).await;
        catalog.schedule_refresh(ProviderId::Anthropic, None);
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(source.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_credential_wins_over_slow_running_refresh() {
        let source = Arc::new(KeyedSource {
            delays: HashMap::from([("old", Duration::from_secs(3))]),
        });
        let store = Arc::new(MemoryStore::new());
        let catalog = ModelCatalog::new(store.clone(), source, Duration::from_millis(1000));

        catalog.schedule_refresh(ProviderId::OpenAi, Some("old".into()));
        // past the settle delay: discovery for "old" is in flight
        tokio::time::sleep(Duration::from_millis(1100)).await;
        catalog.schedule_refresh(ProviderId::OpenAi, Some("new".into()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(catalog.get(ProviderId::OpenAi), vec!["model-from-new-key"]);
        let persisted: Option<Vec<String>> =
            get_json(store.as_ref(), "models:openai").await.unwrap();
        assert_eq!(persisted.unwrap(), vec!["model-from-new-key"]);
    }

    #[tokio::test(start_paused = true)]
    async fn result_for_replaced_slot_is_dropped() {
        let source = CountingSource::returning(&["gemini-2.5-flash"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));
        catalog.schedule_refresh(ProviderId::Gemini, Some("AIza-current".into()));

        let current = catalog.inner.generation.load(Ordering::Relaxed) - 1;
        catalog
            .inner
            .run_scheduled(ProviderId::Gemini, Some("AIza-stale"), current + 7)
            .await;
        assert_eq!(
            catalog.get(ProviderId::Gemini),
            ProviderId::Gemini.descriptor().default_models()
        );
        assert!(catalog.inner.lock_pending().contains_key(&ProviderId::Gemini));

        catalog.settled().await;
        assert_eq!(catalog.get(ProviderId::Gemini), vec!["gemini-2.5-flash"]);
        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap().credential.as_deref(), Some("AIza-current"));
    }

    #[tokio::test(start_paused = true)]
    async fn settled_waits_for_scheduled_refreshes() {
        let source = CountingSource::returning(&["model-a"]);
        let catalog = catalog(Arc::clone(&source), Arc::new(MemoryStore::new()));
        catalog.settled().await;

        let start = Instant::now();
        catalog.schedule_refresh(ProviderId::OpenAi, None);
        catalog.schedule_refresh(ProviderId::Anthropic, None);
        catalog.settled().await;

        assert_eq!(source.call_count(), 2);
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(catalog.inner.lock_pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stored_credential_edits_schedule_one_refresh() {
        let source = CountingSource::returning(&["claude-3-5-haiku-latest"]);
        let store = Arc::new(MemoryStore::new());
        let catalog = catalog(Arc::clone(&source), Arc::clone(&store));
        let mut follower = catalog.follow_credentials();

        save_credential(store.as_ref(), ProviderId::Anthropic, "sk-ant-first")
            .await
            .unwrap();
        assert_eq!(follower.next_edit().await, Some(ProviderId::Anthropic));
        save_credential(store.as_ref(), ProviderId::Anthropic, "sk-ant-second")
            .await
            .unwrap();
        assert_eq!(follower.next_edit().await, Some(ProviderId::Anthropic));
        store
            .set("saved_summaries", serde_json::json!([]))
            .await
            .unwrap();

        catalog.settled().await;
        {
            let calls = source.calls.lock().unwrap();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].provider, ProviderId::Anthropic);
            assert_eq!(calls[0].credential.as_deref(), Some("sk-ant-second"));
        }

        drop(follower);
        save_credential(store.as_ref(), ProviderId::Anthropic, "sk-ant-third")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.call_count(), 1);
    }
}
