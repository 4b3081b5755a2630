//! Connection wizard endpoints. Every response is the wizard's current view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::models::ServiceType;
use crate::state::AppState;
use crate::utils::http_helpers::{HTTPError, SignedIn};
use crate::wizard::WizardView;

/// Registers wizard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wizard", get(view).delete(close))
        .route("/wizard/back", post(back))
        .route("/wizard/delegated", post(choose_delegated))
        .route("/wizard/manual", post(choose_manual))
        .route("/wizard/manual/submit", post(submit_manual))
        .route("/wizard/resources/select", post(select_resource))
        .route("/wizard/resources/submit", post(submit_resource))
        .route("/wizard/resources/reload", post(reload_resources))
        .route("/wizard/:provider", post(open))
}

#[derive(Deserialize)]
struct ManualSubmission {
    name: String,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSelection {
    resource_id: u64,
}

type WizardResponse = Result<Json<WizardView>, HTTPError>;

async fn open(
    _user: SignedIn,
    Path(provider): Path<String>,
    State(state): State<AppState>,
) -> WizardResponse {
    let service_type = ServiceType::from_provider_slug(&provider).ok_or_else(|| {
        HTTPError::new(
            StatusCode::NOT_FOUND,
            format!("Unknown provider '{}'", provider),
        )
    })?;
    Ok(Json(state.wizard.open(service_type)?))
}

async fn view(State(state): State<AppState>) -> Json<WizardView> {
    Json(state.wizard.view())
}

async fn close(State(state): State<AppState>) -> Json<WizardView> {
    Json(state.wizard.close())
}

async fn back(_user: SignedIn, State(state): State<AppState>) -> WizardResponse {
    Ok(Json(state.wizard.back()?))
}

async fn choose_delegated(_user: SignedIn, State(state): State<AppState>) -> WizardResponse {
    Ok(Json(state.wizard.choose_delegated()?))
}

async fn choose_manual(_user: SignedIn, State(state): State<AppState>) -> WizardResponse {
    Ok(Json(state.wizard.choose_manual()?))
}

async fn submit_manual(
    _user: SignedIn,
    State(state): State<AppState>,
    Json(submission): Json<ManualSubmission>,
) -> WizardResponse {
    Ok(Json(
        state
            .wizard
            .submit_manual(&submission.name, &submission.token)
            .await?,
    ))
}

async fn select_resource(
    _user: SignedIn,
    State(state): State<AppState>,
    Json(selection): Json<ResourceSelection>,
) -> WizardResponse {
    Ok(Json(state.wizard.select_resource(selection.resource_id)?))
}

async fn submit_resource(_user: SignedIn, State(state): State<AppState>) -> WizardResponse {
    Ok(Json(state.wizard.submit_resource().await?))
}

async fn reload_resources(_user: SignedIn, State(state): State<AppState>) -> WizardResponse {
    Ok(Json(state.wizard.reload_resources().await?))
}
