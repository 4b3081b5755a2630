use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the credential, the handshake handoff and per-connection caches live.
/// We differentiate the backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Lost on restart, like a browser tab's session storage.
    #[serde(rename = "memory")]
    #[default]
    Memory,
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}
