use std::net::SocketAddr;

use crate::config::helpers::{optional_env, parse_optional_env, require_positive};
use crate::error::ConfigError;
use crate::settings::Settings;

/// BFF HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let host = optional_env("BFF_HOST")?.unwrap_or_else(|| settings.server.host.clone());
        let port = parse_optional_env::<u16>("BFF_PORT", "a valid port number")?
            .unwrap_or(settings.server.port);
        let body_limit_bytes =
            parse_optional_env::<u64>("BFF_BODY_LIMIT_BYTES", "a positive integer")?
                .unwrap_or(settings.server.body_limit_bytes as u64);
        let body_limit_bytes = require_positive("BFF_BODY_LIMIT_BYTES", body_limit_bytes)?;

        let config = Self {
            host,
            port,
            body_limit_bytes: usize::try_from(body_limit_bytes).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "BFF_BODY_LIMIT_BYTES".to_string(),
                    message: "too large for this platform".to_string(),
                }
            })?,
        };
        config.socket_addr()?;
        Ok(config)
    }

    /// Address to bind; the host must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .or_else(|_| format!("[{}]:{}", self.host, self.port).parse())
            .map_err(|e| ConfigError::InvalidValue {
                key: "BFF_HOST".to_string(),
                message: format!("'{}' is not an IP address: {e}", self.host),
            })
    }
}
