//! Error types for leancanvas.

use std::time::Duration;

use serde::Serialize;

use crate::domain::TaskKind;
use crate::workflow::Step;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Failure domains for the structured error payload.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDomain {
    Config,
    Validation,
    Upstream,
    Normalization,
    Workflow,
    Server,
}

/// Structured error payload for BFF responses and log fields.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub domain: ErrorDomain,
    pub code: &'static str,
    pub retryable: bool,
    pub message: String,
}

impl ErrorPayload {
    fn new(
        domain: ErrorDomain,
        code: &'static str,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain,
            code,
            retryable,
            message: message.into(),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Failures talking to the upstream generation service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("DIFY_API_KEY is not set; configure it in the environment or config.toml")]
    MissingApiKey,

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upstream request failed: {reason}")]
    Transport { reason: String },

    #[error("upstream request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("upstream returned an empty answer")]
    EmptyReply,

    #[error("invalid upstream response: {reason}")]
    InvalidResponse { reason: String },
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Status {
                status: status.as_u16(),
                message: crate::llm::redact_sensitive_detail(&e.to_string()),
            };
        }
        Self::Transport {
            reason: crate::llm::redact_sensitive_detail(&e.to_string()),
        }
    }
}

/// Normalization found nothing usable in an upstream reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("no usable {} in upstream reply", task.record_label())]
    MalformedUpstreamData { task: TaskKind },
}

/// Rejected or failed workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("operation requires step {}, workflow is at {}", expected.title(), actual.title())]
    InvalidStep { expected: Step, actual: Step },

    #[error("a request is already in flight")]
    RequestInFlight,

    #[error("no request is pending")]
    NothingPending,

    #[error("no {kind} with id {id} in the current list")]
    UnknownSelection { kind: &'static str, id: i64 },

    #[error("cannot go {direction} from {}", step.title())]
    AtBoundary { step: Step, direction: &'static str },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// BFF server lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server failed: {0}")]
    Serve(String),
}

impl UpstreamError {
    fn to_error_payload(&self) -> ErrorPayload {
        let message = self.to_string();
        match self {
            Self::MissingApiKey => {
                ErrorPayload::new(ErrorDomain::Config, "config.missing_api_key", false, message)
            }
            Self::Status { status, .. } => ErrorPayload::new(
                ErrorDomain::Upstream,
                "upstream.http_status",
                *status >= 500 || *status == 429,
                message,
            ),
            Self::Transport { .. } => {
                ErrorPayload::new(ErrorDomain::Upstream, "upstream.transport", true, message)
            }
            Self::Timeout { .. } => {
                ErrorPayload::new(ErrorDomain::Upstream, "upstream.timeout", true, message)
            }
            Self::EmptyReply => {
                ErrorPayload::new(ErrorDomain::Upstream, "upstream.empty_reply", true, message)
            }
            Self::InvalidResponse { .. } => ErrorPayload::new(
                ErrorDomain::Upstream,
                "upstream.invalid_response",
                true,
                message,
            ),
        }
    }
}

impl WorkflowError {
    pub fn to_error_payload(&self) -> ErrorPayload {
        let message = self.to_string();
        match self {
            Self::Validation(_) => ErrorPayload::new(
                ErrorDomain::Validation,
                "validation.invalid_input",
                false,
                message,
            ),
            Self::InvalidStep { .. } => {
                ErrorPayload::new(ErrorDomain::Workflow, "workflow.invalid_step", false, message)
            }
            Self::RequestInFlight => ErrorPayload::new(
                ErrorDomain::Workflow,
                "workflow.request_in_flight",
                true,
                message,
            ),
            Self::NothingPending => ErrorPayload::new(
                ErrorDomain::Workflow,
                "workflow.nothing_pending",
                false,
                message,
            ),
            Self::UnknownSelection { .. } => ErrorPayload::new(
                ErrorDomain::Validation,
                "validation.unknown_selection",
                false,
                message,
            ),
            Self::AtBoundary { .. } => {
                ErrorPayload::new(ErrorDomain::Workflow, "workflow.at_boundary", false, message)
            }
            Self::Upstream(e) => e.to_error_payload(),
            Self::Normalize(_) => ErrorPayload::new(
                ErrorDomain::Normalization,
                "normalize.malformed_upstream_data",
                true,
                message,
            ),
        }
    }
}

impl Error {
    /// Map any error into the structured payload shape.
    pub fn to_error_payload(&self) -> ErrorPayload {
        match self {
            Self::Config(e) => {
                ErrorPayload::new(ErrorDomain::Config, "config.invalid", false, e.to_string())
            }
            Self::Upstream(e) => e.to_error_payload(),
            Self::Normalize(e) => WorkflowError::Normalize(e.clone()).to_error_payload(),
            Self::Workflow(e) => e.to_error_payload(),
            Self::Server(e) => {
                ErrorPayload::new(ErrorDomain::Server, "server.failed", false, e.to_string())
            }
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
