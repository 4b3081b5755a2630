//! Builds the canonical list of connected services from the two backend collections.

pub mod merge;
pub mod refresh;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

pub use merge::{merge_services, MergeAnomaly, MergeOutcome};
pub use refresh::{
    run_refresh_loop, ChannelRefreshSource, RefreshHandle, RefreshSignal, RefreshSource,
};

use crate::backend::BackendClient;
use crate::error::{ConnectError, Recovery};
use crate::models::{ConnectedService, ServiceType};
use crate::session::Session;

/// The last reconciliation result, as served to the dashboard.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub services: Vec<ConnectedService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<Recovery>,
    /// Set when the refresh ended the session; the caller goes back to `/`.
    pub session_ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

struct Applied {
    generation: u64,
    snapshot: ServiceSnapshot,
}

pub struct ServiceReconciler {
    backend: Arc<BackendClient>,
    session: Arc<Session>,
    generation: AtomicU64,
    current: RwLock<Applied>,
}

impl ServiceReconciler {
    pub fn new(backend: Arc<BackendClient>, session: Arc<Session>) -> Self {
        ServiceReconciler {
            backend,
            session,
            generation: AtomicU64::new(0),
            current: RwLock::new(Applied {
                generation: 0,
                snapshot: ServiceSnapshot::default(),
            }),
        }
    }

    /// Issue both reads together and merge them. Either failing fails the whole pass.
    pub async fn load_connected_services(&self) -> Result<Vec<ConnectedService>, ConnectError> {
        let reads = futures::join!(
            self.backend.list_integrations(),
            self.backend
                .list_repositories(ServiceType::SourceControl.provider_slug()),
        );
        // A rejected credential outranks any other failure, whichever read finished first.
        let (integrations, repositories) = match reads {
            (Ok(integrations), Ok(repositories)) => (integrations, repositories),
            (Err(ConnectError::AuthRejected), _) | (_, Err(ConnectError::AuthRejected)) => {
                return Err(ConnectError::AuthRejected)
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        let outcome = merge_services(&integrations, &repositories);
        for anomaly in &outcome.anomalies {
            anomaly.log();
        }
        debug!(
            event_name = "reconciler.merged",
            event_domain = "reconciler",
            integrations = integrations.len(),
            repositories = repositories.len(),
            services = outcome.services.len(),
            "Reconciled connected services"
        );
        Ok(outcome.services)
    }

    pub fn current(&self) -> ServiceSnapshot {
        match self.current.read() {
            Ok(applied) => applied.snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().snapshot.clone(),
        }
    }

    /// Reload and store the snapshot. A rejected credential ends the session
    /// here and is never retried; any other failure yields an empty,
    /// retryable snapshot.
    pub async fn refresh(&self) -> ServiceSnapshot {
        if !self.session.is_logged_in() {
            debug!(
                event_name = "reconciler.skipped",
                event_domain = "reconciler",
                "Not logged in; skipping refresh"
            );
            self.apply(self.next_generation(), ServiceSnapshot::default());
            return self.current();
        }

        let generation = self.next_generation();
        let epoch = self.session.epoch();
        let snapshot = match self.load_connected_services().await {
            Ok(services) => ServiceSnapshot {
                services,
                refreshed_at: Some(Utc::now()),
                ..Default::default()
            },
            Err(ConnectError::AuthRejected) => {
                match self.session.logout_if_current(epoch).await {
                    Ok(true) => warn!(
                        event_name = "reconciler.auth_rejected",
                        event_domain = "reconciler",
                        "Backend rejected the session; logged out"
                    ),
                    // The rejected token belonged to a session that has since been replaced.
                    Ok(false) => return self.current(),
                    Err(e) => error!(
                        event_name = "session.teardown_failed",
                        event_domain = "session",
                        "Failed to clear credentials: {}",
                        e
                    ),
                }
                ServiceSnapshot {
                    error: Some(ConnectError::AuthRejected.user_message()),
                    recovery: Some(Recovery::SignIn),
                    session_ended: true,
                    ..Default::default()
                }
            }
            Err(e) => {
                error!(
                    event_name = "reconciler.failed",
                    event_domain = "reconciler",
                    kind = e.kind(),
                    "Failed to load connected services: {}",
                    e
                );
                ServiceSnapshot {
                    error: Some(e.user_message()),
                    recovery: Some(Recovery::Retry),
                    refreshed_at: Some(Utc::now()),
                    ..Default::default()
                }
            }
        };

        // An older refresh finishing late must not overwrite a newer result.
        if !self.apply(generation, snapshot.clone()) {
            debug!(
                event_name = "reconciler.stale_result",
                event_domain = "reconciler",
                generation,
                "Dropping result of a superseded refresh"
            );
        }
        snapshot
    }

    pub async fn handle_signal(&self, signal: RefreshSignal) -> ServiceSnapshot {
        refresh::log_signal(signal);
        self.refresh().await
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn apply(&self, generation: u64, snapshot: ServiceSnapshot) -> bool {
        let mut applied = match self.current.write() {
            Ok(applied) => applied,
            Err(poisoned) => poisoned.into_inner(),
        };
        if generation < applied.generation {
            return false;
        }
        applied.generation = generation;
        applied.snapshot = snapshot;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::models::UserProfile;
    use crate::store::memory_store::MemoryStore;
    use crate::store::{CredentialStore, StoreSnapshot};
    use mockito::{Matcher, Mock, Server, ServerGuard};

    async fn setup(server: &ServerGuard) -> (Arc<MemoryStore>, Arc<Session>, ServiceReconciler) {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(Session::new(store.clone()));
        session
            .login("session-1", UserProfile::new("u-1", "ada@example.com"))
            .await
            .unwrap();
        let backend = BackendClient::new(
            &BackendConfig {
                base_url: server.url(),
                timeout_in_ms: None,
            },
            store.clone(),
        )
        .unwrap();
        let reconciler = ServiceReconciler::new(Arc::new(backend), session.clone());
        (store, session, reconciler)
    }

    async fn mock_reads(server: &mut ServerGuard) -> Vec<Mock> {
        let integrations = server
            .mock("GET", "/api/integrations")
            .match_query(Matcher::UrlEncoded("activeOnly".into(), "true".into()))
            .with_status(200)
            .with_body(
                r#"{"success": true, "data": [{"id": 7, "serviceType": "slack", "workspaceName": "Acme"}]}"#,
            )
            .create_async()
            .await;
        let repositories = server
            .mock("GET", "/api/repositories/github")
            .with_status(200)
            .with_body(
                r#"{"success": true, "data": [
                    {"id": 3, "repositoryName": "app", "repositoryUrl": "https://github.com/acme/app", "isActive": true},
                    {"id": 4, "repositoryName": "old", "repositoryUrl": "https://github.com/acme/old", "isActive": false}
                ]}"#,
            )
            .create_async()
            .await;
        vec![integrations, repositories]
    }

    #[tokio::test]
    async fn reconciles_both_sources_in_order() {
        let mut server = Server::new_async().await;
        let _mocks = mock_reads(&mut server).await;
        let (_store, _session, reconciler) = setup(&server).await;

        let services = reconciler.load_connected_services().await.unwrap();
        let ids: Vec<&str> = services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["slack-7", "source-control-repo-3"]);
        assert_eq!(services[0].workspace_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn repeated_loads_are_identical() {
        let mut server = Server::new_async().await;
        let _mocks = mock_reads(&mut server).await;
        let (_store, _session, reconciler) = setup(&server).await;

        let first = reconciler.load_connected_services().await.unwrap();
        let second = reconciler.load_connected_services().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn auth_rejection_tears_the_session_down_once() {
        let mut server = Server::new_async().await;
        let integrations = server
            .mock("GET", "/api/integrations")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let _repositories = server
            .mock("GET", "/api/repositories/github")
            .with_status(401)
            .create_async()
            .await;
        let (store, session, reconciler) = setup(&server).await;

        let snapshot = reconciler.refresh().await;
        assert!(snapshot.session_ended);
        assert_eq!(snapshot.recovery, Some(Recovery::SignIn));
        assert!(snapshot.services.is_empty());
        assert!(!session.is_logged_in());
        assert_eq!(store.snapshot().await, StoreSnapshot::default());

        // Logged out now: a further refresh does not call the backend again.
        let again = reconciler.refresh().await;
        assert!(!again.session_ended);
        integrations.assert_async().await;
    }

    #[tokio::test]
    async fn other_failures_give_an_empty_retryable_snapshot() {
        let mut server = Server::new_async().await;
        let _integrations = server
            .mock("GET", "/api/integrations")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"success": false, "error": "database unavailable"}"#)
            .create_async()
            .await;
        let _repositories = server
            .mock("GET", "/api/repositories/github")
            .with_status(200)
            .with_body(r#"{"success": true, "data": []}"#)
            .create_async()
            .await;
        let (store, session, reconciler) = setup(&server).await;

        let snapshot = reconciler.refresh().await;
        assert!(snapshot.services.is_empty());
        assert_eq!(snapshot.recovery, Some(Recovery::Retry));
        assert!(snapshot.error.unwrap().contains("database unavailable"));
        assert!(session.is_logged_in());
        assert!(store.token().await.unwrap().is_some());
        assert_eq!(reconciler.current().recovery, Some(Recovery::Retry));
    }

    #[tokio::test]
    async fn focus_signal_refreshes_the_cached_snapshot() {
        let mut server = Server::new_async().await;
        let _mocks = mock_reads(&mut server).await;
        let (_store, _session, reconciler) = setup(&server).await;

        assert!(reconciler.current().services.is_empty());
        reconciler.handle_signal(RefreshSignal::WindowFocus).await;
        assert_eq!(reconciler.current().services.len(), 2);
    }

    #[tokio::test]
    async fn rejection_outranks_a_server_error_on_the_other_read() {
        let mut server = Server::new_async().await;
        let _integrations = server
            .mock("GET", "/api/integrations")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"success": false, "error": "database unavailable"}"#)
            .create_async()
            .await;
        let _repositories = server
            .mock("GET", "/api/repositories/github")
            .with_status(401)
            .create_async()
            .await;
        let (_store, session, reconciler) = setup(&server).await;

        assert!(matches!(
            reconciler.load_connected_services().await,
            Err(ConnectError::AuthRejected)
        ));
        let snapshot = reconciler.refresh().await;
        assert!(snapshot.session_ended);
        assert_eq!(snapshot.recovery, Some(Recovery::SignIn));
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn rejection_of_a_replaced_session_keeps_the_new_one() {
        let mut server = Server::new_async().await;
        let (store, session, reconciler) = setup(&server).await;
        let relogin = session.clone();
        let _integrations = server
            .mock("GET", "/api/integrations")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body_from_request(move |_| {
                // The user signs in again while the old request is in flight.
                futures::executor::block_on(
                    relogin.login("session-2", UserProfile::new("u-2", "grace@example.com")),
                )
                .unwrap();
                b"{}".to_vec()
            })
            .create_async()
            .await;
        let _repositories = server
            .mock("GET", "/api/repositories/github")
            .with_status(200)
            .with_body(r#"{"success": true, "data": []}"#)
            .create_async()
            .await;

        let snapshot = reconciler.refresh().await;
        assert!(!snapshot.session_ended);
        assert!(session.is_logged_in());
        assert_eq!(store.token().await.unwrap().as_deref(), Some("session-2"));
        assert_eq!(
            session.snapshot().user.map(|u| u.id),
            Some("u-2".to_string())
        );
    }
}
