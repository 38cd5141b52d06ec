use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level tool configuration, loaded from guildvault.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct VaultConfig {
    pub api: ApiSection,
    pub storage: StorageSection,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ApiSection {
    /// Base URL of the guild service REST API.
    pub base_url: String,
    /// Bearer token authorizing reads and writes on the target guild.
    pub token: String,
    /// Per-request timeout; a hung remote call stalls only its own
    /// sub-task branch.
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".into(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory snapshot documents are stored in.
    pub dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            dir: "snapshots".into(),
        }
    }
}

impl VaultConfig {
    /// Load config from a TOML file. Falls back to defaults if the file
    /// doesn't exist. Environment variables override TOML values.
    pub fn load(path: &str) -> Self {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read config file {}: {}", path, e));
            toml::from_str(&contents)
                .unwrap_or_else(|e| panic!("failed to parse config file {}: {}", path, e))
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GUILDVAULT_API_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("GUILDVAULT_TOKEN") {
            self.api.token = v;
        }
        if let Ok(v) = std::env::var("GUILDVAULT_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.api.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("GUILDVAULT_STORAGE_DIR") {
            self.storage.dir = v;
        }
    }
}
