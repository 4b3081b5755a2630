use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::{ConnectError, Recovery};
use crate::models::UserProfile;
use crate::state::AppState;
use crate::wizard::WizardError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
pub struct HTTPError {
    status: StatusCode,
    message: String,
    kind: Option<&'static str>,
    recovery: Option<Recovery>,
    redirect: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovery: Option<Recovery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'a str>,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            kind: None,
            recovery: None,
            redirect: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Every domain error keeps its specific message and recovery action on the wire.
impl From<ConnectError> for HTTPError {
    fn from(err: ConnectError) -> Self {
        let status = match &err {
            ConnectError::AuthRejected => StatusCode::UNAUTHORIZED,
            ConnectError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ConnectError::AttachmentConflict(_) => StatusCode::CONFLICT,
            ConnectError::ProviderCancelled(_) => StatusCode::BAD_REQUEST,
            ConnectError::InvalidHandoff(_) => StatusCode::GONE,
            ConnectError::ExchangeFailed(_)
            | ConnectError::Network(_)
            | ConnectError::Backend(_) => StatusCode::BAD_GATEWAY,
        };
        HTTPError {
            status,
            message: err.user_message(),
            kind: Some(err.kind()),
            recovery: Some(err.recovery()),
            // A rejected credential always sends the user back to the entry point.
            redirect: err.is_auth_rejected().then(|| "/".to_string()),
        }
    }
}

impl From<WizardError> for HTTPError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Connect(e) => e.into(),
            WizardError::NotOpen | WizardError::UnknownProvider(_) => {
                HTTPError::new(StatusCode::NOT_FOUND, err.to_string())
            }
            WizardError::InvalidAction { .. } => HTTPError::new(StatusCode::CONFLICT, err.to_string()),
            WizardError::Store(_) => {
                error!(
                    event_name = "store.error",
                    event_domain = "store",
                    "{}",
                    err
                );
                HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

/// Maps credential store errors to a 500.
pub fn store_error(e: String) -> HTTPError {
    error!(
        event_name = "store.error",
        event_domain = "store",
        "Store error: {}",
        e
    );
    HTTPError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Store error: {}", e),
    )
}

// -- Session guard

/// The signed-in user. Handlers taking this reject anonymous requests with a
/// 401 that points back to the entry point.
pub struct SignedIn(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = HTTPError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<SignedIn, HTTPError> {
        let session = state.session.snapshot();
        match session.user {
            Some(user) if session.is_logged_in => Ok(SignedIn(user)),
            _ => {
                let mut err = HTTPError::from(ConnectError::AuthRejected);
                err.message = "Sign in to manage connections.".to_string();
                Err(err)
            }
        }
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            kind: self.kind,
            recovery: self.recovery,
            redirect: self.redirect.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}
