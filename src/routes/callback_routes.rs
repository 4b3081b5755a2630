//! The route each provider redirects back to after authorization.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;
use crate::wizard::{CallbackOutcome, CallbackParams};

/// Registers the provider callback route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/callback/:provider", get(callback))
}

/// Reads `code`, `error`, `mode` and `state` from the query string and nothing else.
async fn callback(
    Path(provider): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, HTTPError> {
    let Some(service_type) = state
        .providers
        .by_slug(&provider)
        .map(|adapter| adapter.service_type())
    else {
        return Err(HTTPError::new(
            StatusCode::NOT_FOUND,
            format!("Unknown provider '{}'", provider),
        ));
    };

    let outcome = state.wizard.handle_callback(service_type, &params).await?;
    Ok(match outcome {
        CallbackOutcome::Redirect { location } => Redirect::to(&location).into_response(),
        CallbackOutcome::SessionEnded { redirect } => Redirect::to(&redirect).into_response(),
        outcome @ CallbackOutcome::Connected { .. } => Json(outcome).into_response(),
        outcome @ CallbackOutcome::Failed { .. } => {
            (StatusCode::BAD_REQUEST, Json(outcome)).into_response()
        }
    })
}
