use serde::{Deserialize, Serialize};

use crate::models::RecordId;

/// Every backend response is wrapped as `{success, data, error?}`.
#[derive(Deserialize, Debug)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// The most specific failure text the backend gave us.
    pub fn failure_text(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }
}

/// One row of `GET /api/integrations`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRecord {
    pub id: RecordId,
    pub service_type: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
}

/// One row of `GET /api/repositories/<provider>`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    pub id: RecordId,
    pub repository_name: String,
    pub repository_url: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ExchangeTokenData {
    pub access_token: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateTokenData {
    #[serde(default)]
    pub is_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_without_data_parses() {
        let envelope: ApiEnvelope<Vec<IntegrationRecord>> =
            serde_json::from_str(r#"{"success": false, "error": "nope"}"#).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.failure_text().as_deref(), Some("nope"));
    }

    #[test]
    fn repository_record_defaults_to_inactive() {
        let record: RepositoryRecord = serde_json::from_str(
            r#"{"id": 3, "repositoryName": "app", "repositoryUrl": "https://github.com/acme/app"}"#,
        )
        .unwrap();
        assert!(!record.is_active);
    }
}
