pub mod base;
pub mod file_store;
pub mod memory_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{CredentialStore, create_store};"
pub use base::{ConnectionCacheEntry, CredentialStore, StoreSnapshot, create_store};
