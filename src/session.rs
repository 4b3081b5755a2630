//! Process-wide authentication state. `initialize`, `login`, `logout` and
//! `update_user` are the only mutators; everything else reads snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{UserProfile, UserProfileUpdate};
use crate::store::CredentialStore;

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_logged_in: bool,
}

pub struct Session {
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    /// Bumped on every login and logout.
    epoch: AtomicU64,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Session {
            store,
            state: RwLock::new(SessionState::default()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Identifies the current session. A request that captured an older epoch
    /// belongs to a session that has since ended or been replaced.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn snapshot(&self) -> SessionState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.snapshot().is_logged_in
    }

    fn replace(&self, next: SessionState) {
        match self.state.write() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Restore the session from the store. A token without a profile (or the
    /// reverse) is wiped so the process never starts half-authenticated.
    pub async fn initialize(&self) -> Result<SessionState, String> {
        let token = self.store.token().await?;
        let profile = self.store.profile().await?;

        let next = match (token, profile) {
            (Some(_), Some(profile)) => {
                info!(
                    event_name = "session.restored",
                    event_domain = "session",
                    user_id = profile.id.as_str(),
                    "Restored session for '{}'",
                    profile.email
                );
                SessionState {
                    user: Some(profile),
                    is_logged_in: true,
                }
            }
            (None, None) => SessionState::default(),
            (token, profile) => {
                warn!(
                    event_name = "session.inconsistent",
                    event_domain = "session",
                    has_token = token.is_some(),
                    has_profile = profile.is_some(),
                    "Stored credentials are inconsistent; starting logged out"
                );
                self.store.clear_credentials().await?;
                SessionState::default()
            }
        };
        self.replace(next.clone());
        Ok(next)
    }

    pub async fn login(&self, token: &str, profile: UserProfile) -> Result<SessionState, String> {
        if token.trim().is_empty() {
            return Err("token must not be empty".to_string());
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        // A new session never inherits the previous one's artifacts.
        if self.is_logged_in() {
            self.teardown().await?;
        }
        self.store.set_token(token.trim()).await?;
        self.store.set_profile(&profile).await?;

        info!(
            event_name = "session.login",
            event_domain = "session",
            user_id = profile.id.as_str(),
            "User '{}' logged in",
            profile.email
        );
        let next = SessionState {
            user: Some(profile),
            is_logged_in: true,
        };
        self.replace(next.clone());
        Ok(next)
    }

    /// The single teardown call site. Returns whether a live session was ended,
    /// so concurrent callers that lose the race do not log a second logout.
    pub async fn logout(&self) -> Result<bool, String> {
        let was_logged_in = self.is_logged_in();
        self.replace(SessionState::default());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.teardown().await?;
        if was_logged_in {
            info!(
                event_name = "session.logout",
                event_domain = "session",
                "Session ended; credentials and cached connection data cleared"
            );
        }
        Ok(was_logged_in)
    }

    /// Log out only if the session that issued a rejected request is still the
    /// current one. Returns `false` when the rejection belonged to an older session.
    pub async fn logout_if_current(&self, epoch: u64) -> Result<bool, String> {
        if self.epoch() != epoch {
            debug!(
                event_name = "session.stale_rejection",
                event_domain = "session",
                epoch,
                current = self.epoch(),
                "Ignoring a rejection issued under a previous session"
            );
            return Ok(false);
        }
        self.logout().await?;
        Ok(true)
    }

    async fn teardown(&self) -> Result<(), String> {
        self.store.clear_credentials().await?;
        self.store.clear_connection_caches().await?;
        if self.store.take_handoff().await?.is_some() {
            info!(
                event_name = "session.handoff_discarded",
                event_domain = "session",
                "Discarded a pending handshake handoff"
            );
        }
        Ok(())
    }

    /// Merge a partial profile update. Returns `None` when nobody is logged in.
    pub async fn update_user(
        &self,
        update: UserProfileUpdate,
    ) -> Result<Option<UserProfile>, String> {
        let Some(mut profile) = self.snapshot().user else {
            return Ok(None);
        };
        profile.apply(update);
        self.store.set_profile(&profile).await?;
        self.replace(SessionState {
            user: Some(profile.clone()),
            is_logged_in: true,
        });
        Ok(Some(profile))
    }
}
