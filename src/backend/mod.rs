//! Client side of the application backend's HTTP contracts.

pub mod client;
pub mod envelope;

pub use client::BackendClient;
pub use envelope::{ApiEnvelope, IntegrationRecord, RepositoryRecord};
