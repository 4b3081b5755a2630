//! HTTP route definitions and handlers.
//!
//! Routes are grouped by concern: the session, the connected-service list and
//! dashboard, the provider callback, the connection wizard and health checks.

mod callback_routes;
mod health_routes;
mod service_routes;
mod session_routes;
mod wizard_routes;

use axum::Router;

use crate::state::AppState;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(session_routes::routes())
        .merge(service_routes::routes())
        .merge(callback_routes::routes())
        .merge(wizard_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
