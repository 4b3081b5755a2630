use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The closed set of provider families the dashboard can connect.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    Chat,
    Docs,
    SourceControl,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [
        ServiceType::Chat,
        ServiceType::Docs,
        ServiceType::SourceControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Chat => "chat",
            ServiceType::Docs => "docs",
            ServiceType::SourceControl => "source-control",
        }
    }

    /// Path segment used for this family in backend and callback URLs.
    pub fn provider_slug(&self) -> &'static str {
        match self {
            ServiceType::Chat => "slack",
            ServiceType::Docs => "google-docs",
            ServiceType::SourceControl => "github",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceType::Chat => "Slack",
            ServiceType::Docs => "Google Docs",
            ServiceType::SourceControl => "GitHub",
        }
    }

    /// Every backend `serviceType` tag that maps onto this family.
    /// This match is the single tag table; adding a variant fails to compile until it is listed.
    pub fn backend_tags(&self) -> &'static [&'static str] {
        match self {
            ServiceType::Chat => &["slack"],
            ServiceType::Docs => &["google_docs", "google-docs", "googledocs"],
            ServiceType::SourceControl => &["github"],
        }
    }

    pub fn from_backend_tag(tag: &str) -> Option<ServiceType> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|service_type| service_type.backend_tags().contains(&tag.as_str()))
    }

    pub fn from_provider_slug(slug: &str) -> Option<ServiceType> {
        Self::ALL
            .into_iter()
            .find(|service_type| service_type.provider_slug().eq_ignore_ascii_case(slug))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend record ids arrive as numbers from some collections and strings from others.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Id of a connection that came from the generic integrations collection.
pub fn integration_service_id(backend_tag: &str, record_id: &RecordId) -> String {
    format!("{}-{}", backend_tag.trim().to_ascii_lowercase(), record_id)
}

/// Id of a connection that came from the source-control repositories collection.
/// The `repo` infix keeps it disjoint from every integration id.
pub fn repository_service_id(record_id: &RecordId) -> String {
    format!("{}-repo-{}", ServiceType::SourceControl.as_str(), record_id)
}

/// The unified view of one connected service.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedService {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

/// A resource (repository) the user may attach through the source-control provider.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachableResource {
    pub id: u64,
    pub full_name: String,
    pub url: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_already_attached: bool,
}

impl AttachableResource {
    pub fn is_selectable(&self) -> bool {
        !self.is_already_attached
    }
}
