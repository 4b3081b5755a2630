//! Error taxonomy shared by the providers, the reconciler and the wizard.

use serde::Serialize;
use thiserror::Error;

/// What the user can do after an error is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Repeat the same step with the same (or corrected) input.
    Retry,
    /// Return to the previous step of the flow.
    GoBack,
    /// The session is gone; start again from the entry point.
    SignIn,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The application's own bearer credential was refused.
    #[error("authentication rejected by backend")]
    AuthRejected,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("token validation failed: {0}")]
    ValidationFailed(String),

    #[error("resource already attached: {0}")]
    AttachmentConflict(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authorization cancelled at provider: {0}")]
    ProviderCancelled(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid handshake handoff: {0}")]
    InvalidHandoff(String),
}

impl ConnectError {
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ConnectError::AuthRejected)
    }

    /// A message specific to the failure, suitable for showing inline.
    pub fn user_message(&self) -> String {
        match self {
            ConnectError::AuthRejected => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ConnectError::ExchangeFailed(detail) => format!(
                "The provider's authorization could not be completed ({detail}). Start the connection again."
            ),
            ConnectError::ValidationFailed(detail) => {
                format!("The token was not accepted by the provider: {detail}")
            }
            ConnectError::AttachmentConflict(detail) => {
                format!("This resource is already connected: {detail}")
            }
            ConnectError::Network(detail) => {
                format!("Could not reach the server ({detail}). Check your connection and retry.")
            }
            ConnectError::ProviderCancelled(detail) => {
                format!("Authorization was cancelled at the provider ({detail}).")
            }
            ConnectError::Backend(detail) => format!("The server reported an error: {detail}"),
            ConnectError::InvalidHandoff(detail) => format!(
                "The pending connection could not be resumed ({detail}). Start the connection again."
            ),
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            ConnectError::AuthRejected => Recovery::SignIn,
            ConnectError::ExchangeFailed(_)
            | ConnectError::ProviderCancelled(_)
            | ConnectError::AttachmentConflict(_)
            | ConnectError::InvalidHandoff(_) => Recovery::GoBack,
            ConnectError::ValidationFailed(_)
            | ConnectError::Network(_)
            | ConnectError::Backend(_) => Recovery::Retry,
        }
    }

    /// Stable identifier used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::AuthRejected => "auth_rejected",
            ConnectError::ExchangeFailed(_) => "exchange_failed",
            ConnectError::ValidationFailed(_) => "validation_failed",
            ConnectError::AttachmentConflict(_) => "attachment_conflict",
            ConnectError::Network(_) => "network_error",
            ConnectError::ProviderCancelled(_) => "provider_cancelled",
            ConnectError::Backend(_) => "backend_error",
            ConnectError::InvalidHandoff(_) => "invalid_handoff",
        }
    }
}

impl From<reqwest::Error> for ConnectError {
    fn from(err: reqwest::Error) -> Self {
        ConnectError::Network(err.to_string())
    }
}
