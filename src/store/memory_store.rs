use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{ConnectionCacheEntry, CredentialStore, StoreSnapshot};
use crate::models::UserProfile;

/// A process-local store. Nothing survives a restart.
pub struct MemoryStore {
    state: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(StoreSnapshot::default()),
        }
    }

    /// Start from an existing snapshot (used to simulate a reload).
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        MemoryStore {
            state: Mutex::new(snapshot),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn token(&self) -> Result<Option<String>, String> {
        Ok(self.state.lock().await.token.clone())
    }

    async fn set_token(&self, token: &str) -> Result<(), String> {
        self.state.lock().await.token = Some(token.to_string());
        Ok(())
    }

    async fn profile(&self) -> Result<Option<UserProfile>, String> {
        Ok(self.state.lock().await.profile.clone())
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<(), String> {
        self.state.lock().await.profile = Some(profile.clone());
        Ok(())
    }

    async fn clear_credentials(&self) -> Result<(), String> {
        let mut state = self.state.lock().await;
        state.token = None;
        state.profile = None;
        Ok(())
    }

    async fn put_handoff(&self, handoff: Value) -> Result<(), String> {
        self.state.lock().await.handoff = Some(handoff);
        Ok(())
    }

    async fn take_handoff(&self) -> Result<Option<Value>, String> {
        Ok(self.state.lock().await.handoff.take())
    }

    async fn put_connection_cache(
        &self,
        connection_id: &str,
        entry: ConnectionCacheEntry,
    ) -> Result<(), String> {
        self.state
            .lock()
            .await
            .connections
            .insert(connection_id.to_string(), entry);
        Ok(())
    }

    async fn connection_cache(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionCacheEntry>, String> {
        Ok(self.state.lock().await.connections.get(connection_id).cloned())
    }

    async fn clear_connection_caches(&self) -> Result<(), String> {
        self.state.lock().await.connections.clear();
        Ok(())
    }
}
