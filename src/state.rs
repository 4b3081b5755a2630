//! Shared application state.
//!
//! Contains the state that is shared across all request handlers: the
//! session, the reconciler, the wizard and the configured providers.

use std::sync::Arc;

use crate::config::ConfigV1;
use crate::providers::ProviderRegistry;
use crate::reconciler::{RefreshHandle, ServiceReconciler};
use crate::session::Session;
use crate::wizard::WizardController;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The only component that mutates authentication state.
    pub session: Arc<Session>,
    pub reconciler: Arc<ServiceReconciler>,
    pub wizard: Arc<WizardController>,
    pub providers: Arc<ProviderRegistry>,
    /// Feeds the background refresh loop.
    pub refresh: RefreshHandle,
}
