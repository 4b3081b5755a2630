use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use super::base::{AuthMode, ProviderAccessToken, ProviderAdapter, ResourceCatalog, TokenValidation};
use super::oauth::{AuthorizationTarget, OAuthClientConfig};
use crate::backend::BackendClient;
use crate::error::ConnectError;
use crate::models::{AttachableResource, ServiceType};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const DEFAULT_SCOPES: &[&str] = &["repo", "read:user"];

/// Source-control provider. The only one that hands out a provider token and
/// lets the user pick which repository to attach.
pub struct GitHubProvider {
    pub config: OAuthClientConfig,
    target: AuthorizationTarget,
    backend: Arc<BackendClient>,
}

impl GitHubProvider {
    pub fn new(config: &OAuthClientConfig, backend: Arc<BackendClient>) -> Result<Self, String> {
        let target = AuthorizationTarget::new(config, AUTHORIZE_URL, DEFAULT_SCOPES, " ")?;
        info!(
            event_name = "provider.created",
            event_domain = "providers",
            provider = "github",
            "Creating GitHubProvider '{}'",
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
impl ProviderAdapter for GitHubProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::SourceControl
    }

    fn build_authorization_url(&self, mode: AuthMode) -> Url {
        self.target.url_for(mode)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderAccessToken, ConnectError> {
        let token = self
            .backend
            .exchange_repository_code(self.slug(), code)
            .await?;
        debug!(
            event_name = "provider.code_exchanged",
            event_domain = "providers",
            provider = "github",
            "authorization code exchanged"
        );
        Ok(ProviderAccessToken::new(token))
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

    fn resources(&self) -> Option<&dyn ResourceCatalog> {
        Some(self)
    }
}

#[async_trait]
impl ResourceCatalog for GitHubProvider {
    async fn list_resources(
        &self,
        provider_token: &str,
    ) -> Result<Vec<AttachableResource>, ConnectError> {
        self.backend
            .list_attachable_resources(self.slug(), provider_token)
            .await
    }

    async fn attach_resource(
        &self,
        resource: &AttachableResource,
        provider_token: &str,
    ) -> Result<Value, ConnectError> {
        if resource.is_already_attached {
            return Err(ConnectError::AttachmentConflict(format!(
                "{} is already connected",
                resource.full_name
            )));
        }
        self.backend
            .attach_repository(self.slug(), &resource.url, provider_token)
            .await
    }
}
