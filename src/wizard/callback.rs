use serde::Deserialize;

use crate::error::ConnectError;
use crate::models::RESOURCE_SELECT_MARKER;

/// Query string a provider redirects back with.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub mode: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Fail(ConnectError),
    /// Exchange the code and hand the provider token over to the picker.
    ResourceSelect { code: String },
    /// Let the backend complete the exchange and record the connection.
    Connect { code: String, state: Option<String> },
}

/// Decide what a callback means. `error` wins over everything, then a missing
/// code, then the resource-select marker in either `mode` or `state`.
pub fn classify_callback(params: &CallbackParams) -> CallbackAction {
    if let Some(error) = params.error.as_deref() {
        let detail = params
            .error_description
            .clone()
            .unwrap_or_else(|| error.to_string());
        return CallbackAction::Fail(if error == "access_denied" {
            ConnectError::ProviderCancelled(detail)
        } else {
            ConnectError::ExchangeFailed(detail)
        });
    }

    let code = match params.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => {
            return CallbackAction::Fail(ConnectError::ExchangeFailed(
                "the provider did not return an authorization code".to_string(),
            ))
        }
    };

    let is_marker = |value: &Option<String>| value.as_deref() == Some(RESOURCE_SELECT_MARKER);
    if is_marker(&params.mode) || is_marker(&params.state) {
        CallbackAction::ResourceSelect { code }
    } else {
        CallbackAction::Connect {
            code,
            state: params.state.clone(),
        }
    }
}
