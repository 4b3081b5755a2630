//! Session endpoints: sign in, sign out and profile updates.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::models::{UserProfile, UserProfileUpdate};
use crate::reconciler::RefreshSignal;
use crate::session::SessionState;
use crate::state::AppState;
use crate::utils::http_helpers::{store_error, HTTPError, SignedIn};

/// Registers session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(current_session))
        .route("/session/login", post(login))
        .route("/session/logout", post(logout))
        .route("/session/user", patch(update_user))
}

#[derive(Deserialize)]
struct LoginRequest {
    token: String,
    user: UserProfile,
}

async fn current_session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.session.snapshot())
}

/// Stores the credential issued by the backend's own sign-in flow.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionState>, HTTPError> {
    if request.token.trim().is_empty() {
        return Err(HTTPError::new(StatusCode::BAD_REQUEST, "token must not be empty"));
    }
    state.wizard.close();
    let session = state
        .session
        .login(&request.token, request.user)
        .await
        .map_err(store_error)?;
    state.refresh.signal(RefreshSignal::InitialMount);
    Ok(Json(session))
}

async fn logout(State(state): State<AppState>) -> Result<Json<SessionState>, HTTPError> {
    state.wizard.close();
    state.session.logout().await.map_err(store_error)?;
    // Clears the cached list; nobody is signed in any more.
    state.reconciler.refresh().await;
    Ok(Json(state.session.snapshot()))
}

async fn update_user(
    _user: SignedIn,
    State(state): State<AppState>,
    Json(update): Json<UserProfileUpdate>,
) -> Result<Json<UserProfile>, HTTPError> {
    match state.session.update_user(update).await.map_err(store_error)? {
        Some(profile) => Ok(Json(profile)),
        None => Err(HTTPError::new(
            StatusCode::UNAUTHORIZED,
            "Sign in to update your profile.",
        )),
    }
}
