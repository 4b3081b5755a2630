use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::info;

use super::base::{AuthMode, ProviderAdapter, TokenValidation};
use super::oauth::{AuthorizationTarget, OAuthClientConfig};
use crate::backend::BackendClient;
use crate::error::ConnectError;
use crate::models::ServiceType;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/documents.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Docs provider backed by Google's OAuth endpoint.
pub struct GoogleDocsProvider {
    pub config: OAuthClientConfig,
    target: AuthorizationTarget,
    backend: Arc<BackendClient>,
}

impl GoogleDocsProvider {
    pub fn new(config: &OAuthClientConfig, backend: Arc<BackendClient>) -> Result<Self, String> {
        let target = AuthorizationTarget::new(config, AUTHORIZE_URL, DEFAULT_SCOPES, " ")?
            .with_param("response_type", "code")
            .with_param("access_type", "offline");
        info!(
            event_name = "provider.created",
            event_domain = "providers",
            provider = "google-docs",
            "Creating GoogleDocsProvider '{}'",
            config.name
        );
        Ok(Self {
            config: config.clone(),
            target,
            backend,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleDocsProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Docs
    }

    fn build_authorization_url(&self, mode: AuthMode) -> Url {
        self.target.url_for(mode)
    }

    async fn complete_callback(&self, code: &str, state: Option<&str>) -> Result<(), ConnectError> {
        self.backend
            .complete_oauth_callback(self.slug(), code, state)
            .await?;
        Ok(())
    }

    async fn validate_token(&self, raw_token: &str) -> Result<TokenValidation, ConnectError> {
        if raw_token.trim().is_empty() {
            return Ok(TokenValidation { is_valid: false });
        }
        let is_valid = self
            .backend
            .validate_token(self.slug(), raw_token.trim())
            .await?;
        Ok(TokenValidation { is_valid })
    }

    async fn manual_setup(&self, name: &str, token: &str) -> Result<Value, ConnectError> {
        self.backend.manual_setup(self.slug(), name, token.trim()).await
    }
}
