use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::StoreConfig;
use crate::models::UserProfile;

/// Disposable per-connection data kept on the client side, keyed by connection id.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConnectionCacheEntry {
    #[serde(default)]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
}

/// Everything a store holds. Backends persist this as a whole.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    /// Raw handoff record; validated by the reader, never by the store.
    #[serde(default)]
    pub handoff: Option<Value>,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionCacheEntry>,
}

/// The CredentialStore trait abstracts client-side state that must survive a redirect.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    fn backend_name(&self) -> &str;

    async fn token(&self) -> Result<Option<String>, String>;
    async fn set_token(&self, token: &str) -> Result<(), String>;
    async fn profile(&self) -> Result<Option<UserProfile>, String>;
    async fn set_profile(&self, profile: &UserProfile) -> Result<(), String>;
    /// Removes the token and the cached profile together.
    async fn clear_credentials(&self) -> Result<(), String>;

    async fn put_handoff(&self, handoff: Value) -> Result<(), String>;
    /// Returns the pending handoff and deletes it under the same lock.
    /// Two concurrent callers can never both observe the same record.
    async fn take_handoff(&self) -> Result<Option<Value>, String>;

    async fn put_connection_cache(
        &self,
        connection_id: &str,
        entry: ConnectionCacheEntry,
    ) -> Result<(), String>;
    async fn connection_cache(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionCacheEntry>, String>;
    async fn clear_connection_caches(&self) -> Result<(), String>;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>, String> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory credential store; state is lost on restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::File(file_config) => {
            let store = FileStore::open(&file_config.path).await?;
            info!(
                "Using file credential store at '{}'",
                file_config.path.display()
            );
            Ok(Arc::new(store))
        }
    }
}
