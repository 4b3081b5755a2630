//! Connected-service list and the dashboard entry point.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectError;
use crate::models::RESOURCE_SELECT_MARKER;
use crate::reconciler::{RefreshSignal, ServiceSnapshot};
use crate::session::SessionState;
use crate::state::AppState;
use crate::store::ConnectionCacheEntry;
use crate::utils::http_helpers::{store_error, HTTPError, SignedIn};
use crate::wizard::{StepError, WizardError, WizardView};

/// Registers service and dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services))
        .route("/services/refresh", post(refresh_services))
        .route("/dashboard", get(dashboard))
        .route(
            "/services/:id/config",
            get(connection_config).put(save_connection_config),
        )
}

#[derive(Deserialize, Default)]
struct ServicesQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Deserialize)]
struct RefreshRequest {
    signal: RefreshSignal,
}

#[derive(Deserialize, Default)]
struct DashboardQuery {
    picker: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardView {
    session: SessionState,
    services: ServiceSnapshot,
    wizard: WizardView,
    /// A pending handoff that could not be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    handoff_error: Option<StepError>,
}

/// A snapshot whose refresh ended the session becomes a 401 with a redirect to `/`.
fn checked(snapshot: ServiceSnapshot) -> Result<Json<ServiceSnapshot>, HTTPError> {
    if snapshot.session_ended {
        return Err(ConnectError::AuthRejected.into());
    }
    Ok(Json(snapshot))
}

async fn list_services(
    _user: SignedIn,
    State(state): State<AppState>,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<ServiceSnapshot>, HTTPError> {
    if query.refresh {
        return checked(state.reconciler.refresh().await);
    }
    checked(state.reconciler.current())
}

async fn refresh_services(
    _user: SignedIn,
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ServiceSnapshot>, HTTPError> {
    checked(state.reconciler.handle_signal(request.signal).await)
}

/// Mounting the dashboard reloads the service list. With
/// `?picker=resource_select` a pending handoff is consumed and the wizard
/// reopens in the resource picker.
async fn dashboard(
    _user: SignedIn,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, HTTPError> {
    let mut handoff_error = None;
    if query.picker.as_deref() == Some(RESOURCE_SELECT_MARKER) {
        match state.wizard.resume_from_handoff().await {
            Ok(_) => {}
            Err(WizardError::Connect(e @ ConnectError::InvalidHandoff(_))) => {
                handoff_error = Some(StepError::from(&e));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let services = checked(
        state
            .reconciler
            .handle_signal(RefreshSignal::InitialMount)
            .await,
    )?
    .0;

    Ok(Json(DashboardView {
        session: state.session.snapshot(),
        services,
        wizard: state.wizard.view(),
        handoff_error,
    }))
}

/// Local settings the dashboard keeps for one connection. Disposable; a
/// logout removes them.
async fn connection_config(
    _user: SignedIn,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HTTPError> {
    match state
        .session
        .store()
        .connection_cache(&id)
        .await
        .map_err(store_error)?
    {
        Some(entry) => Ok(Json(entry.config)),
        None => Err(HTTPError::new(
            StatusCode::NOT_FOUND,
            format!("No local configuration for '{}'", id),
        )),
    }
}

async fn save_connection_config(
    _user: SignedIn,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<Value>,
) -> Result<Json<Value>, HTTPError> {
    let store = state.session.store();
    let mut entry = store
        .connection_cache(&id)
        .await
        .map_err(store_error)?
        .unwrap_or_else(ConnectionCacheEntry::default);
    entry.config = config;
    store
        .put_connection_cache(&id, entry.clone())
        .await
        .map_err(store_error)?;
    Ok(Json(entry.config))
}
