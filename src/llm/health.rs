//! Upstream connectivity probe used by `leancanvas doctor`.

use std::error::Error as _;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::config::UpstreamConfig;

/// Typed upstream health state for operator surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamHealthState {
    Healthy,
    InvalidUrl,
    DnsFailure,
    ConnectFailure,
    Timeout,
    AuthFailure,
    HttpFailure,
}

impl UpstreamHealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::InvalidUrl => "invalid_url",
            Self::DnsFailure => "dns_failure",
            Self::ConnectFailure => "connect_failure",
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::HttpFailure => "http_failure",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamHealth {
    pub url: String,
    pub state: UpstreamHealthState,
    pub detail: String,
    pub http_status: Option<u16>,
}

impl UpstreamHealth {
    fn new(url: &str, state: UpstreamHealthState, detail: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            state,
            detail: detail.into(),
            http_status: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}

/// Probe `GET {base}/parameters` and classify the outcome.
///
/// Any status below 500 other than 401/403 counts as reachable.
pub async fn probe_upstream(config: &UpstreamConfig, timeout: Duration) -> UpstreamHealth {
    let url = format!("{}/parameters", config.base_url.trim_end_matches('/'));
    if reqwest::Url::parse(&url).is_err() {
        return UpstreamHealth::new(&url, UpstreamHealthState::InvalidUrl, "URL parse failed");
    }

    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(error) => {
            return UpstreamHealth::new(
                &url,
                UpstreamHealthState::ConnectFailure,
                format!("HTTP client init failed: {error}"),
            );
        }
    };

    let mut request = client.get(&url).query(&[("user", config.user.as_str())]);
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key.expose_secret());
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let state = if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                UpstreamHealthState::AuthFailure
            } else if status.is_server_error() {
                UpstreamHealthState::HttpFailure
            } else {
                UpstreamHealthState::Healthy
            };
            UpstreamHealth {
                http_status: Some(status.as_u16()),
                ..UpstreamHealth::new(&url, state, format!("HTTP {}", status.as_u16()))
            }
        }
        Err(error) => UpstreamHealth::new(&url, classify_transport_error(&error), error.to_string()),
    }
}

fn classify_transport_error(error: &reqwest::Error) -> UpstreamHealthState {
    if error.is_timeout() {
        return UpstreamHealthState::Timeout;
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::NotFound => UpstreamHealthState::DnsFailure,
                _ => UpstreamHealthState::ConnectFailure,
            };
        }
        source = err.source();
    }

    let lowered = error.to_string().to_ascii_lowercase();
    if lowered.contains("dns")
        || lowered.contains("lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        UpstreamHealthState::DnsFailure
    } else {
        UpstreamHealthState::ConnectFailure
    }
}
