//! User settings file.
//!
//! Stores overrides in `~/.leancanvas/config.toml`.
//! Settings are resolved with env var > config.toml > default priority.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings loaded from the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// Upstream generation service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL override for the upstream API.
    #[serde(default)]
    pub api_url: Option<String>,

    /// API key. Prefer `DIFY_API_KEY` in the environment or `.env`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Value sent as the upstream `user` field.
    #[serde(default)]
    pub user: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            user: None,
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

fn default_upstream_timeout_secs() -> u64 {
    120
}

/// BFF server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_body_limit_bytes() -> usize {
    1024 * 1024
}

/// Workflow driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Caller-side timeout around each upstream call. Defaults to the
    /// upstream timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Default TOML config file path (~/.leancanvas/config.toml).
    pub fn default_toml_path() -> PathBuf {
        crate::bootstrap::leancanvas_base_dir().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        toml::from_str(&data)
            .map(Some)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))
    }

    /// Write a commented TOML config file with current settings.
    pub fn save_toml(&self, path: &Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# leancanvas configuration file.\n\
             #\n\
             # Priority: env var > this file > defaults.\n\
             # Keep DIFY_API_KEY in the environment or ~/.leancanvas/.env.\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }
}
