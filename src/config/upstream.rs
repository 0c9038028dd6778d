use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env, require_positive};
use crate::error::ConfigError;
use crate::settings::Settings;

pub const DEFAULT_API_URL: &str = "https://api.dify.ai/v1";
pub const DEFAULT_USER: &str = "leancanvas-user";

/// Upstream generation service configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://api.dify.ai/v1`.
    pub base_url: String,
    /// Bearer credential. Absence is reported when a request is made.
    pub api_key: Option<SecretString>,
    /// Upstream `user` field.
    pub user: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base_url = optional_env("DIFY_API_URL")?
            .or_else(|| settings.upstream.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        validate_base_url("DIFY_API_URL", &base_url)?;

        let api_key = optional_env("DIFY_API_KEY")?
            .or_else(|| {
                settings
                    .upstream
                    .api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
            })
            .map(SecretString::from);

        let user = optional_env("DIFY_USER")?
            .or_else(|| settings.upstream.user.clone())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let timeout_secs = parse_optional_env::<u64>("UPSTREAM_TIMEOUT_SECS", "a positive integer")?
            .unwrap_or(settings.upstream.timeout_secs);
        let timeout_secs = require_positive("UPSTREAM_TIMEOUT_SECS", timeout_secs)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            user,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Accept only absolute http(s) URLs with a host.
pub(crate) fn validate_base_url(key: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("invalid URL '{raw}': {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(())
}
