pub mod handoff;
pub mod service;
pub mod user;

pub use handoff::{HandoffMode, HandshakeHandoff, CONNECT_MARKER, RESOURCE_SELECT_MARKER};
pub use service::{AttachableResource, ConnectedService, RecordId, ServiceType};
pub use user::{UserProfile, UserProfileUpdate};
