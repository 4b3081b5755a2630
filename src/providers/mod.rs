pub mod base;
pub mod github_provider;
pub mod google_docs_provider;
pub mod oauth;
pub mod registry;
pub mod slack_provider;

// Re-export so callers can do "use crate::providers::*;"
pub use base::*;
pub use oauth::OAuthClientConfig;
pub use registry::ProviderRegistry;
