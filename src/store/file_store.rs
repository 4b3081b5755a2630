use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ConnectionCacheEntry, CredentialStore, StoreSnapshot};
use crate::models::UserProfile;

/// A store persisted as one JSON document. The process that opened it owns the file;
/// every mutation rewrites it through a temp file and a rename.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl FileStore {
    pub async fn open(path: &Path) -> Result<Self, String> {
        let snapshot = match tokio::fs::read_to_string(path).await {
            Ok(data) => match serde_json::from_str::<StoreSnapshot>(&data) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // A corrupt cache is disposable; start clean rather than refuse to run.
                    warn!(
                        "Credential store '{}' is unreadable ({}); starting empty",
                        path.display(),
                        e
                    );
                    StoreSnapshot::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreSnapshot::default(),
            Err(e) => return Err(format!("Error reading '{}': {}", path.display(), e)),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("Error creating '{}': {}", parent.display(), e))?;
            }
        }

        Ok(FileStore {
            path: path.to_path_buf(),
            state: Mutex::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &StoreSnapshot) -> Result<(), String> {
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| format!("Error serializing store: {}", e))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| format!("Error writing '{}': {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("Error replacing '{}': {}", self.path.display(), e))?;
        debug!("Persisted credential store to '{}'", self.path.display());
        Ok(())
    }

    /// Apply a mutation and persist it before releasing the lock.
    async fn update<R>(&self, mutate: impl FnOnce(&mut StoreSnapshot) -> R) -> Result<R, String> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let result = mutate(&mut next);
        self.persist(&next).await?;
        *state = next;
        Ok(result)
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    fn backend_name(&self) -> &str {
        "file"
    }

    async fn token(&self) -> Result<Option<String>, String> {
        Ok(self.state.lock().await.token.clone())
    }

    async fn set_token(&self, token: &str) -> Result<(), String> {
        self.update(|s| s.token = Some(token.to_string())).await
    }

    async fn profile(&self) -> Result<Option<UserProfile>, String> {
        Ok(self.state.lock().await.profile.clone())
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<(), String> {
        self.update(|s| s.profile = Some(profile.clone())).await
    }

    async fn clear_credentials(&self) -> Result<(), String> {
        self.update(|s| {
            s.token = None;
            s.profile = None;
        })
        .await
    }

    async fn put_handoff(&self, handoff: Value) -> Result<(), String> {
        self.update(|s| s.handoff = Some(handoff)).await
    }

    async fn take_handoff(&self) -> Result<Option<Value>, String> {
        self.update(|s| s.handoff.take()).await
    }

    async fn put_connection_cache(
        &self,
        connection_id: &str,
        entry: ConnectionCacheEntry,
    ) -> Result<(), String> {
        self.update(|s| {
            s.connections.insert(connection_id.to_string(), entry);
        })
        .await
    }

    async fn connection_cache(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionCacheEntry>, String> {
        Ok(self.state.lock().await.connections.get(connection_id).cloned())
    }

    async fn clear_connection_caches(&self) -> Result<(), String> {
        self.update(|s| s.connections.clear()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set_token("bearer-1").await.unwrap();
        store
            .set_profile(&UserProfile::new("u-1", "a@example.com"))
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.token().await.unwrap().as_deref(), Some("bearer-1"));
        assert_eq!(reopened.profile().await.unwrap().unwrap().id, "u-1");
    }

    #[tokio::test]
    async fn taken_handoff_is_gone_after_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.put_handoff(json!({"mode": "resource_select"})).await.unwrap();
        assert!(store.take_handoff().await.unwrap().is_some());
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert!(reopened.take_handoff().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.token().await.unwrap(), None);
    }
}
