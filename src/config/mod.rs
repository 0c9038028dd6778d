//! Configuration for leancanvas.
//!
//! Settings are loaded with priority: env var > config.toml > default.
//! `DIFY_API_KEY` usually lives in `./.env` or `~/.leancanvas/.env`
//! (loaded via dotenvy early in startup).

mod channels;
pub(crate) mod helpers;
mod upstream;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::settings::Settings;

pub use self::channels::ServerConfig;
pub use self::upstream::{DEFAULT_API_URL, DEFAULT_USER, UpstreamConfig};

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub workflow: WorkflowConfig,
}

/// Workflow driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Caller-side timeout around each upstream call.
    pub timeout: Duration,
}

impl WorkflowConfig {
    pub(crate) fn resolve(
        settings: &Settings,
        upstream: &UpstreamConfig,
    ) -> Result<Self, ConfigError> {
        let timeout = match helpers::parse_optional_env::<u64>(
            "WORKFLOW_TIMEOUT_SECS",
            "a positive integer",
        )?
        .or(settings.workflow.timeout_secs)
        {
            Some(secs) => Duration::from_secs(helpers::require_positive(
                "WORKFLOW_TIMEOUT_SECS",
                secs,
            )?),
            None => upstream.timeout,
        };
        Ok(Self { timeout })
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load env files, then resolve from env and the TOML settings file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional explicit TOML config path.
    pub fn from_env_with_toml(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        crate::bootstrap::load_env();
        let settings = load_settings(toml_path)?;
        Self::build(&settings)
    }

    /// Build config from already-loaded settings.
    pub fn build(settings: &Settings) -> Result<Self, ConfigError> {
        let upstream = UpstreamConfig::resolve(settings)?;
        let workflow = WorkflowConfig::resolve(settings, &upstream)?;
        Ok(Self {
            server: ServerConfig::resolve(settings)?,
            upstream,
            workflow,
        })
    }
}

/// Load the TOML settings file.
///
/// If `explicit_path` is `Some`, the file must exist and parse. If `None`,
/// the default path `~/.leancanvas/config.toml` is tried and a missing file
/// yields defaults.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = explicit_path
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_toml_path);

    match Settings::load_toml(&path) {
        Ok(Some(settings)) => {
            tracing::debug!("Loaded TOML config from {}", path.display());
            Ok(settings)
        }
        Ok(None) if explicit_path.is_some() => Err(ConfigError::ParseError(format!(
            "Config file not found: {}",
            path.display()
        ))),
        Ok(None) => Ok(Settings::default()),
        Err(e) => Err(ConfigError::ParseError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const KEYS: [&str; 8] = [
        "DIFY_API_URL",
        "DIFY_API_KEY",
        "DIFY_USER",
        "UPSTREAM_TIMEOUT_SECS",
        "BFF_HOST",
        "BFF_PORT",
        "BFF_BODY_LIMIT_BYTES",
        "WORKFLOW_TIMEOUT_SECS",
    ];

    fn clear_env() {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn resolvers_use_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        let config = Config::build(&Settings::default()).expect("config");
        assert_eq!(config.upstream.base_url, DEFAULT_API_URL);
        assert!(config.upstream.api_key.is_none());
        assert_eq!(config.upstream.user, DEFAULT_USER);
        assert_eq!(config.upstream.timeout, Duration::from_secs(120));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.body_limit_bytes, 1024 * 1024);
        assert_eq!(config.workflow.timeout, config.upstream.timeout);
    }

    #[test]
    fn env_overrides_settings_file() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("DIFY_API_URL", "http://localhost:5001/v1/");
            std::env::set_var("DIFY_API_KEY", "app-test");
            std::env::set_var("BFF_PORT", "8123");
        }

        let mut settings = Settings::default();
        settings.upstream.api_url = Some("https://ignored.example/v1".to_string());
        settings.upstream.user = Some("from-toml".to_string());
        settings.server.port = 4000;
        settings.workflow.timeout_secs = Some(15);

        let config = Config::build(&settings).expect("config");
        assert_eq!(config.upstream.base_url, "http://localhost:5001/v1");
        assert_eq!(
            config
                .upstream
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            Some("app-test".to_string())
        );
        assert_eq!(config.upstream.user, "from-toml");
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.workflow.timeout, Duration::from_secs(15));

        clear_env();
    }

    #[test]
    fn rejects_invalid_values() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");

        for (key, value) in [
            ("DIFY_API_URL", "ftp://files.example"),
            ("DIFY_API_URL", "not a url"),
            ("UPSTREAM_TIMEOUT_SECS", "0"),
            ("UPSTREAM_TIMEOUT_SECS", "soon"),
            ("BFF_PORT", "70000"),
            ("BFF_HOST", "localhost"),
            ("WORKFLOW_TIMEOUT_SECS", "0"),
        ] {
            clear_env();
            // SAFETY: Guarded by ENV_MUTEX in tests.
            unsafe {
                std::env::set_var(key, value);
            }
            match Config::build(&Settings::default()) {
                Err(ConfigError::InvalidValue { key: got, .. }) => assert_eq!(got, key),
                other => panic!("expected invalid {key}={value}, got {other:?}"),
            }
        }

        clear_env();
    }

    #[test]
    fn explicit_missing_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[workflow]\ntimeout_secs = 5\n").unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.workflow.timeout_secs, Some(5));
    }
}
