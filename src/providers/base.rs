use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    github_provider::GitHubProvider, google_docs_provider::GoogleDocsProvider,
    oauth::OAuthClientConfig, slack_provider::SlackProvider,
};
use crate::backend::BackendClient;
use crate::error::ConnectError;
use crate::models::{AttachableResource, ServiceType, CONNECT_MARKER, RESOURCE_SELECT_MARKER};

/// Configuration options for each provider. The tag matches the provider slug.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "slack")]
    Slack(OAuthClientConfig),
    #[serde(rename = "google-docs")]
    GoogleDocs(OAuthClientConfig),
    #[serde(rename = "github")]
    GitHub(OAuthClientConfig),
}

/// Which flow the authorization redirect starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Authorize and record the connection in one step.
    Connect,
    /// Authorize, then let the user pick which resource to attach.
    ResourceSelect,
}

impl AuthMode {
    /// The `state` value echoed back by the provider.
    pub fn marker(&self) -> &'static str {
        match self {
            AuthMode::Connect => CONNECT_MARKER,
            AuthMode::ResourceSelect => RESOURCE_SELECT_MARKER,
        }
    }
}

/// An access token issued by a provider. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderAccessToken(String);

impl ProviderAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        ProviderAccessToken(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderAccessToken(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub is_valid: bool,
}

/// A provider adapter knows how to start, finish and short-circuit (manual token)
/// the authorization of one provider family.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn get_name(&self) -> &str;
    fn service_type(&self) -> ServiceType;

    /// Path segment used in backend and callback URLs.
    fn slug(&self) -> &'static str {
        self.service_type().provider_slug()
    }

    /// The redirect target at the provider. `state` carries `mode.marker()` unmodified.
    fn build_authorization_url(&self, mode: AuthMode) -> Url;

    /// One-shot exchange of an authorization code for a provider token.
    async fn exchange_code(&self, _code: &str) -> Result<ProviderAccessToken, ConnectError> {
        Err(ConnectError::ExchangeFailed(format!(
            "{} does not hand out provider tokens",
            self.get_name()
        )))
    }

    /// Completes a simple connect flow; the backend performs the exchange and records the connection.
    async fn complete_callback(&self, code: &str, state: Option<&str>) -> Result<(), ConnectError>;

    /// Never an error for a merely-invalid token.
    async fn validate_token(&self, raw_token: &str) -> Result<TokenValidation, ConnectError>;

    /// Records a connection from a manually supplied token. Callers validate first.
    async fn manual_setup(&self, name: &str, token: &str) -> Result<Value, ConnectError>;

    /// Providers exposing several attachable resources return their catalog here.
    fn resources(&self) -> Option<&dyn ResourceCatalog> {
        None
    }
}

/// Listing and attaching resources, for providers that need the user to pick one.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    async fn list_resources(
        &self,
        provider_token: &str,
    ) -> Result<Vec<AttachableResource>, ConnectError>;

    async fn attach_resource(
        &self,
        resource: &AttachableResource,
        provider_token: &str,
    ) -> Result<Value, ConnectError>;
}

/// Create a provider adapter from a given config.
pub fn create_provider(
    config: &ProviderConfig,
    backend: Arc<BackendClient>,
) -> Result<Box<dyn ProviderAdapter>, String> {
    Ok(match config {
        ProviderConfig::Slack(cfg) => Box::new(SlackProvider::new(cfg, backend)?),
        ProviderConfig::GoogleDocs(cfg) => Box::new(GoogleDocsProvider::new(cfg, backend)?),
        ProviderConfig::GitHub(cfg) => Box::new(GitHubProvider::new(cfg, backend)?),
    })
}
