//! Upstream gateway adapter.
//!
//! One blocking call per invocation to the external generation service.
//! The adapter returns data and an updated session context; it never
//! touches workflow state.

mod dify;
mod health;
mod session;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::TaskKind;
use crate::error::UpstreamError;

pub use self::dify::DifyClient;
pub use self::health::{UpstreamHealth, UpstreamHealthState, probe_upstream};
pub use self::session::{
    MAX_ERROR_DETAIL_CHARS, SessionContext, error_detail, redact_sensitive_detail,
};

/// A single request to the upstream service.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCall {
    /// Structured generation task run by the upstream workflow.
    Task {
        kind: TaskKind,
        inputs: Map<String, Value>,
    },
    /// Free-text chat query; continues the session conversation.
    Query { text: String, user: Option<String> },
}

impl UpstreamCall {
    pub fn task(kind: TaskKind, inputs: Map<String, Value>) -> Self {
        Self::Task { kind, inputs }
    }

    pub fn query(text: impl Into<String>) -> Self {
        Self::Query {
            text: text.into(),
            user: None,
        }
    }

    /// Task kind for task calls; `None` for chat queries.
    pub fn kind(&self) -> Option<TaskKind> {
        match self {
            Self::Task { kind, .. } => Some(*kind),
            Self::Query { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Task { kind, .. } => kind.as_str(),
            Self::Query { .. } => "query",
        }
    }
}

/// Raw upstream answer plus the tokens it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    /// Answer text, or structured workflow outputs.
    pub answer: Value,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
}

impl UpstreamReply {
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: Value::String(answer.into()),
            conversation_id: None,
            message_id: None,
        }
    }

    /// Fails with [`UpstreamError::EmptyReply`] when the answer is blank.
    pub fn ensure_answer(self) -> Result<Self, UpstreamError> {
        if is_blank_answer(&self.answer) {
            Err(UpstreamError::EmptyReply)
        } else {
            Ok(self)
        }
    }
}

/// True for null, whitespace-only text, and empty objects or arrays.
pub fn is_blank_answer(answer: &Value) -> bool {
    match answer {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Transport to the upstream generation service.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// Issue exactly one blocking request.
    ///
    /// Implementations attach `session`'s conversation token when the call
    /// style supports it and must reject blank answers with
    /// [`UpstreamError::EmptyReply`].
    async fn invoke(
        &self,
        call: &UpstreamCall,
        session: &SessionContext,
    ) -> Result<UpstreamReply, UpstreamError>;

    /// Name for logs and health output.
    fn name(&self) -> &str {
        "upstream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_answers_are_rejected() {
        for answer in [json!(null), json!(""), json!(" \n\t"), json!({}), json!([])] {
            let reply = UpstreamReply {
                answer,
                conversation_id: Some("conv-1".to_string()),
                message_id: None,
            };
            assert!(matches!(reply.ensure_answer(), Err(UpstreamError::EmptyReply)));
        }
        assert!(UpstreamReply::text("1. persona").ensure_answer().is_ok());
        assert!(!is_blank_answer(&json!({"result": "x"})));
    }

    #[test]
    fn call_labels() {
        let call = UpstreamCall::task(TaskKind::ProductName, Map::new());
        assert_eq!(call.label(), "productname");
        assert_eq!(call.kind(), Some(TaskKind::ProductName));
        assert_eq!(UpstreamCall::query("hi").kind(), None);
    }
}
