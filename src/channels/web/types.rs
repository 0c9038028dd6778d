//! Request and response DTOs for the BFF API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorPayload;

// --- Generate ---

/// Body of `POST /generate`.
///
/// Either `task` + `inputs` (structured generation) or `query` (free-text
/// chat, optionally continuing `conversationId`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub inputs: Option<Map<String, Value>>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl GenerateResponse {
    pub fn ok(task: Option<&str>, data: Value) -> Self {
        Self {
            success: true,
            data,
            task: task.map(str::to_string),
            error: None,
            code: None,
        }
    }

    pub fn failed(task: Option<&str>, payload: &ErrorPayload) -> Self {
        Self {
            success: false,
            data: Value::Null,
            task: task.map(str::to_string),
            error: Some(payload.message.clone()),
            code: Some(payload.code.to_string()),
        }
    }
}

/// `data` of a free-text query response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnswer {
    pub answer: Value,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channel: &'static str,
    pub upstream: String,
}
