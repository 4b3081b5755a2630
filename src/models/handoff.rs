use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectError;
use crate::models::service::ServiceType;

/// Marker carried in `state`/`mode` for flows that continue in the resource picker.
pub const RESOURCE_SELECT_MARKER: &str = "resource_select";
/// Marker carried in `state` for a plain connect flow.
pub const CONNECT_MARKER: &str = "connect";

const HANDOFF_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffMode {
    #[serde(rename = "resource_select")]
    ResourceSelect,
}

/// State passed from the callback route to the dashboard route across a redirect.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HandshakeHandoff {
    pub version: u32,
    pub provider: ServiceType,
    pub provider_access_token: String,
    pub mode: HandoffMode,
    pub created_at: DateTime<Utc>,
}

impl HandshakeHandoff {
    pub fn resource_select(provider: ServiceType, provider_access_token: impl Into<String>) -> Self {
        HandshakeHandoff {
            version: HANDOFF_VERSION,
            provider,
            provider_access_token: provider_access_token.into(),
            mode: HandoffMode::ResourceSelect,
            created_at: Utc::now(),
        }
    }

    pub fn to_value(&self) -> Value {
        // Plain struct of strings and enums; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validate a raw stored record against the handoff schema.
    pub fn from_value(value: Value, ttl: Duration, now: DateTime<Utc>) -> Result<Self, ConnectError> {
        let handoff: HandshakeHandoff = serde_json::from_value(value)
            .map_err(|e| ConnectError::InvalidHandoff(format!("malformed record: {}", e)))?;

        if handoff.version != HANDOFF_VERSION {
            return Err(ConnectError::InvalidHandoff(format!(
                "unsupported version {}",
                handoff.version
            )));
        }
        if handoff.provider_access_token.trim().is_empty() {
            return Err(ConnectError::InvalidHandoff(
                "provider access token is empty".to_string(),
            ));
        }
        if now.signed_duration_since(handoff.created_at) > ttl {
            return Err(ConnectError::InvalidHandoff("handoff has expired".to_string()));
        }
        Ok(handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_handoff_survives_storage_format() {
        let handoff = HandshakeHandoff::resource_select(ServiceType::SourceControl, "gho_abc");
        let value = handoff.to_value();
        assert_eq!(value["mode"], "resource_select");
        assert_eq!(value["providerAccessToken"], "gho_abc");

        let parsed = HandshakeHandoff::from_value(value, Duration::minutes(10), Utc::now()).unwrap();
        assert_eq!(parsed, handoff);
    }

    #[test]
    fn rejects_unknown_fields_and_modes() {
        let now = Utc::now();
        let extra = json!({
            "version": 1,
            "provider": "source-control",
            "providerAccessToken": "t",
            "mode": "resource_select",
            "createdAt": now,
            "redirect": "https://evil.example"
        });
        assert!(HandshakeHandoff::from_value(extra, Duration::minutes(10), now).is_err());

        let wrong_mode = json!({
            "version": 1,
            "provider": "source-control",
            "providerAccessToken": "t",
            "mode": "connect",
            "createdAt": now
        });
        assert!(HandshakeHandoff::from_value(wrong_mode, Duration::minutes(10), now).is_err());
    }

    #[test]
    fn rejects_empty_token_and_expired_records() {
        let mut handoff = HandshakeHandoff::resource_select(ServiceType::SourceControl, " ");
        let err = HandshakeHandoff::from_value(handoff.to_value(), Duration::minutes(10), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidHandoff(_)));

        handoff.provider_access_token = "token".to_string();
        handoff.created_at = Utc::now() - Duration::minutes(30);
        let err = HandshakeHandoff::from_value(handoff.to_value(), Duration::minutes(10), Utc::now())
            .unwrap_err();
        assert_eq!(err, ConnectError::InvalidHandoff("handoff has expired".to_string()));
    }
}
