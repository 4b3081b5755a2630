use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;
use crate::providers::ProviderConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0, containing backend, providers, store, etc.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct ConfigV1 {
    pub bind_address: String,
    pub backend: BackendConfig,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The application backend that owns integrations and repositories.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// No timeout unless set; a hung backend call leaves the step loading.
    #[serde(default)]
    pub timeout_in_ms: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct WizardConfig {
    /// How long the "connected" confirmation stays up before returning to the dashboard.
    #[serde(default = "default_connected_display_delay_ms")]
    pub connected_display_delay_ms: u64,
    /// Handoffs older than this are discarded unread. Unsigned and 32-bit so
    /// every accepted value is a representable duration.
    #[serde(default = "default_handoff_ttl_secs")]
    pub handoff_ttl_secs: u32,
}

fn default_connected_display_delay_ms() -> u64 {
    2000
}

fn default_handoff_ttl_secs() -> u32 {
    600
}

impl Default for WizardConfig {
    fn default() -> Self {
        WizardConfig {
            connected_display_delay_ms: default_connected_display_delay_ms(),
            handoff_ttl_secs: default_handoff_ttl_secs(),
        }
    }
}

/// Extract a v1 config from any figment.
pub fn config_from_figment(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from "config.yaml" in the current directory, with
/// `CONNECTOTRON_` environment variables taking precedence.
pub fn load_config() -> ConfigV1 {
    let figment = Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("CONNECTOTRON_").split("__"));
    match config_from_figment(figment) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Could not render configuration schema: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStoreConfig;

    const MINIMAL: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8090
backend:
  base_url: http://localhost:3001
providers:
  - type: github
    name: GitHub
    client_id: gh-client
    redirect_uri: http://localhost:8090/callback/github
store:
  type: file
  path: /tmp/connectotron.json
"#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg = config_from_figment(Figment::new().merge(Yaml::string(MINIMAL))).unwrap();
        assert_eq!(cfg.bind_address, "127.0.0.1:8090");
        assert_eq!(cfg.backend.timeout_in_ms, None);
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(
            cfg.store,
            StoreConfig::File(FileStoreConfig {
                path: "/tmp/connectotron.json".into()
            })
        );
        assert_eq!(cfg.wizard.connected_display_delay_ms, 2000);
        assert_eq!(cfg.wizard.handoff_ttl_secs, 600);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn rejects_unknown_version() {
        let yaml = MINIMAL.replace("1.0.0", "9.9.9");
        assert!(config_from_figment(Figment::new().merge(Yaml::string(&yaml))).is_err());
    }

    #[test]
    fn rejects_handoff_ttl_outside_the_duration_range() {
        for ttl in ["-1", "9223372036854775807"] {
            let yaml = format!("{}wizard:\n  handoff_ttl_secs: {}\n", MINIMAL, ttl);
            assert!(
                config_from_figment(Figment::new().merge(Yaml::string(&yaml))).is_err(),
                "accepted handoff_ttl_secs {}",
                ttl
            );
        }
    }
}
