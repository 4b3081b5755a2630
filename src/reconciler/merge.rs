use tracing::warn;

use crate::backend::{IntegrationRecord, RepositoryRecord};
use crate::models::service::{integration_service_id, repository_service_id};
use crate::models::{ConnectedService, ServiceType};

/// A backend record that was left out of the merged list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAnomaly {
    /// A source-control record in the generic collection. That family is only
    /// listed through the repositories collection.
    SourceControlInIntegrations { id: String, tag: String },
    UnknownServiceTag { id: String, tag: String },
}

impl MergeAnomaly {
    pub fn log(&self) {
        match self {
            MergeAnomaly::SourceControlInIntegrations { id, tag } => warn!(
                event_name = "reconciler.excluded_record",
                event_domain = "reconciler",
                record_id = id.as_str(),
                tag = tag.as_str(),
                "Integrations returned a source-control record; it is listed only through repositories"
            ),
            MergeAnomaly::UnknownServiceTag { id, tag } => warn!(
                event_name = "reconciler.unknown_tag",
                event_domain = "reconciler",
                record_id = id.as_str(),
                tag = tag.as_str(),
                "Skipping integration with unknown service type"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub services: Vec<ConnectedService>,
    pub anomalies: Vec<MergeAnomaly>,
}

/// Build the connected-service list from the latest two backend reads.
/// Generic integrations first, then active repositories, in backend order.
pub fn merge_services(
    integrations: &[IntegrationRecord],
    repositories: &[RepositoryRecord],
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for record in integrations {
        let service_type = match ServiceType::from_backend_tag(&record.service_type) {
            Some(ServiceType::SourceControl) => {
                outcome
                    .anomalies
                    .push(MergeAnomaly::SourceControlInIntegrations {
                        id: record.id.to_string(),
                        tag: record.service_type.clone(),
                    });
                continue;
            }
            Some(service_type) => service_type,
            None => {
                outcome.anomalies.push(MergeAnomaly::UnknownServiceTag {
                    id: record.id.to_string(),
                    tag: record.service_type.clone(),
                });
                continue;
            }
        };

        outcome.services.push(ConnectedService {
            id: integration_service_id(&record.service_type, &record.id),
            service_type,
            name: record
                .service_name
                .clone()
                .unwrap_or_else(|| service_type.display_name().to_string()),
            resource_name: None,
            resource_url: None,
            workspace_name: record.workspace_name.clone(),
        });
    }

    outcome.services.extend(
        repositories
            .iter()
            .filter(|record| record.is_active)
            .map(|record| ConnectedService {
                id: repository_service_id(&record.id),
                service_type: ServiceType::SourceControl,
                name: ServiceType::SourceControl.display_name().to_string(),
                resource_name: Some(record.repository_name.clone()),
                resource_url: Some(record.repository_url.clone()),
                workspace_name: None,
            }),
    );

    outcome
}
