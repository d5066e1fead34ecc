//! Key-value persistence for the model cache and saved summaries.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;
use crate::providers::ProviderId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const SAVED_SUMMARIES_KEY: &str = "saved_summaries";

const CHANGE_CAPACITY: usize = 64;

/// Storage key for a provider's discovered model list.
pub fn model_cache_key(provider: ProviderId) -> String {
    format!("models:{provider}")
}

const CREDENTIAL_PREFIX: &str = "credentials:";

/// Storage key for a provider's saved API key.
pub fn credential_key(provider: ProviderId) -> String {
    format!("{CREDENTIAL_PREFIX}{provider}")
}

/// Provider whose credential `key` holds, if it is a credential key.
pub fn credential_provider(key: &str) -> Option<ProviderId> {
    key.strip_prefix(CREDENTIAL_PREFIX)
        .and_then(|id| ProviderId::parse(id).ok())
}

/// Opaque string keys mapped to JSON values.
///
/// Every successful `set` is announced to subscribers with the changed key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Typed read; a value of the wrong shape is reported as corrupt.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(value) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| StorageError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        })
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Saved API key for `provider`; blank values read as none.
pub async fn load_credential(
    store: &dyn KeyValueStore,
    provider: ProviderId,
) -> Result<Option<String>, StorageError> {
    let key: Option<String> = get_json(store, &credential_key(provider)).await?;
    Ok(key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty()))
}

pub async fn save_credential(
    store: &dyn KeyValueStore,
    provider: ProviderId,
    credential: &str,
) -> Result<(), StorageError> {
    set_json(store, &credential_key(provider), credential.trim()).await
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSummary {
    pub title: String,
    /// File path or URL the content came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub provider: ProviderId,
    pub model: String,
    pub language: String,
    pub summary: String,
    pub saved_at: DateTime<Utc>,
}

/// All saved summaries, oldest first.
pub async fn list_saved(store: &dyn KeyValueStore) -> Result<Vec<SavedSummary>, StorageError> {
    Ok(get_json(store, SAVED_SUMMARIES_KEY).await?.unwrap_or_default())
}

/// Append `summary` and return the new count.
pub async fn append_saved(
    store: &dyn KeyValueStore,
    summary: SavedSummary,
) -> Result<usize, StorageError> {
    let mut saved = list_saved(store).await?;
    saved.push(summary);
    set_json(store, SAVED_SUMMARIES_KEY, &saved).await?;
    Ok(saved.len())
}

fn change_channel() -> broadcast::Sender<String> {
    broadcast::channel(CHANGE_CAPACITY).0
}

/// Announce a changed key; having no subscribers is normal.
fn announce(changes: &broadcast::Sender<String>, key: &str) {
    let _ = changes.send(key.to_string());
}
