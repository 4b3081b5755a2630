//! Application startup and server initialization.
//!
//! Builds the credential store, restores the session, wires the providers,
//! reconciler and wizard together and starts serving.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::backend::BackendClient;
use crate::config::ConfigV1;
use crate::providers::ProviderRegistry;
use crate::reconciler::{run_refresh_loop, ChannelRefreshSource, RefreshSignal, ServiceReconciler};
use crate::routes;
use crate::session::Session;
use crate::state::AppState;
use crate::store::create_store;
use crate::wizard::WizardController;

/// Assemble every component from the configuration and start the refresh loop.
///
/// Must be called from within a tokio runtime.
pub async fn build_state(config: Arc<ConfigV1>) -> Result<AppState, String> {
    let store = create_store(&config.store).await?;

    let session = Arc::new(Session::new(store.clone()));
    let restored = session.initialize().await?;

    let backend = Arc::new(BackendClient::new(&config.backend, store)?);
    let providers = Arc::new(ProviderRegistry::from_config(
        &config.providers,
        backend.clone(),
    )?);
    let reconciler = Arc::new(ServiceReconciler::new(backend, session.clone()));

    let (refresh, source) = ChannelRefreshSource::new();
    tokio::spawn(run_refresh_loop(source, reconciler.clone()));
    if restored.is_logged_in {
        refresh.signal(RefreshSignal::InitialMount);
    }

    let wizard = Arc::new(WizardController::new(
        providers.clone(),
        session.clone(),
        refresh.clone(),
        config.wizard.clone(),
    ));

    Ok(AppState {
        config,
        session,
        reconciler,
        wizard,
        providers,
        refresh,
    })
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if any component fails to initialize, the server fails to
/// bind to the configured address, or encounters a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone()).await?;

    info!(
        event_name = "server.starting",
        event_domain = "startup",
        providers = state.providers.configured().len(),
        "Starting server on {}",
        config.bind_address
    );

    let app = routes::create_router(state);
    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
