//! Building authorization redirects shared by all providers.

use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::base::AuthMode;
use crate::models::RESOURCE_SELECT_MARKER;

/// The OAuth client registration of this application at one provider.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct OAuthClientConfig {
    /// A friendly name for logs and the wizard.
    pub name: String,
    pub client_id: String,
    /// The callback route of this service for the provider, e.g. `http://host/callback/github`.
    pub redirect_uri: String,
    /// Overrides the provider's public authorization endpoint.
    #[serde(default)]
    pub authorize_url: Option<String>,
    /// Overrides the provider's default scopes.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

/// A validated authorization endpoint plus everything needed to point a user at it.
#[derive(Debug, Clone)]
pub struct AuthorizationTarget {
    endpoint: Url,
    redirect_uri: Url,
    client_id: String,
    scope: String,
    extra: Vec<(&'static str, &'static str)>,
}

impl AuthorizationTarget {
    /// Parse the configured URLs once, at startup.
    pub fn new(
        config: &OAuthClientConfig,
        default_endpoint: &str,
        default_scopes: &[&str],
        scope_separator: &str,
    ) -> Result<Self, String> {
        let endpoint_text = config.authorize_url.as_deref().unwrap_or(default_endpoint);
        let endpoint = Url::parse(endpoint_text).map_err(|e| {
            format!(
                "Provider '{}': invalid authorize_url '{}': {}",
                config.name, endpoint_text, e
            )
        })?;
        let redirect_uri = Url::parse(&config.redirect_uri).map_err(|e| {
            format!(
                "Provider '{}': invalid redirect_uri '{}': {}",
                config.name, config.redirect_uri, e
            )
        })?;
        let scope = match &config.scopes {
            Some(scopes) => scopes.join(scope_separator),
            None => default_scopes.join(scope_separator),
        };
        Ok(AuthorizationTarget {
            endpoint,
            redirect_uri,
            client_id: config.client_id.clone(),
            scope,
            extra: Vec::new(),
        })
    }

    /// Fixed extra query parameters some providers require (e.g. `response_type`).
    pub fn with_param(mut self, key: &'static str, value: &'static str) -> Self {
        self.extra.push((key, value));
        self
    }

    /// `client_id, redirect_uri, scope, state` plus any fixed extras.
    /// Resource-select flows also carry `mode` on the redirect URI so the callback
    /// can recognise them even if a provider drops `state`.
    pub fn url_for(&self, mode: AuthMode) -> Url {
        let mut redirect_uri = self.redirect_uri.clone();
        if mode == AuthMode::ResourceSelect {
            redirect_uri
                .query_pairs_mut()
                .append_pair("mode", RESOURCE_SELECT_MARKER);
        }

        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("scope", &self.scope)
                .append_pair("state", mode.marker());
            for (key, value) in &self.extra {
                query.append_pair(key, value);
            }
        }
        url
    }
}
