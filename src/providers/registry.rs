use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::base::{create_provider, ProviderAdapter, ProviderConfig};
use crate::backend::BackendClient;
use crate::models::ServiceType;

/// All configured provider adapters, looked up by the family they serve.
pub struct ProviderRegistry {
    providers: HashMap<ServiceType, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn from_config(
        configs: &[ProviderConfig],
        backend: Arc<BackendClient>,
    ) -> Result<Self, String> {
        let mut providers: HashMap<ServiceType, Arc<dyn ProviderAdapter>> = HashMap::new();
        for config in configs {
            let provider: Arc<dyn ProviderAdapter> =
                Arc::from(create_provider(config, backend.clone())?);
            let service_type = provider.service_type();
            if providers.contains_key(&service_type) {
                return Err(format!(
                    "Provider for '{}' is configured more than once",
                    service_type.provider_slug()
                ));
            }
            providers.insert(service_type, provider);
        }
        info!(
            event_name = "providers.loaded",
            event_domain = "providers",
            count = providers.len(),
            "Loaded {} provider(s)",
            providers.len()
        );
        Ok(ProviderRegistry { providers })
    }

    pub fn get(&self, service_type: ServiceType) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(&service_type).cloned()
    }

    /// Look up by the slug used in callback and wizard routes.
    pub fn by_slug(&self, slug: &str) -> Option<Arc<dyn ProviderAdapter>> {
        ServiceType::from_provider_slug(slug).and_then(|service_type| self.get(service_type))
    }

    pub fn configured(&self) -> Vec<ServiceType> {
        ServiceType::ALL
            .into_iter()
            .filter(|service_type| self.providers.contains_key(service_type))
            .collect()
    }
}
