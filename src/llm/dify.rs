//! Dify HTTP client.
//!
//! Task calls run the configured workflow (`POST {base}/workflows/run`);
//! free-text queries go to the chat endpoint (`POST {base}/chat-messages`).
//! Both use blocking response mode and bearer authentication.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{SessionContext, UpstreamCall, UpstreamGateway, UpstreamReply, error_detail};
use crate::config::UpstreamConfig;
use crate::domain::TaskKind;
use crate::error::UpstreamError;

const RESPONSE_MODE: &str = "blocking";

/// Upstream gateway backed by the Dify REST API.
pub struct DifyClient {
    client: Client,
    config: UpstreamConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowResponse {
    #[serde(default)]
    workflow_run_id: Option<String>,
    #[serde(default)]
    data: Option<WorkflowRunData>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    outputs: Value,
    #[serde(default)]
    error: Option<String>,
}

impl DifyClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&SecretString, UpstreamError> {
        self.config
            .api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(UpstreamError::MissingApiKey)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<reqwest::Response, UpstreamError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            error_detail(&body)
        };
        tracing::warn!(status = status.as_u16(), path, "upstream returned an error status");
        Err(UpstreamError::Status {
            status: status.as_u16(),
            message: detail,
        })
    }

    fn classify(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout {
                timeout: self.config.timeout,
            }
        } else {
            UpstreamError::from(error)
        }
    }

    async fn run_workflow(
        &self,
        kind: TaskKind,
        inputs: &Map<String, Value>,
    ) -> Result<UpstreamReply, UpstreamError> {
        let mut workflow_inputs = Map::new();
        workflow_inputs.insert("task".to_string(), Value::String(kind.as_str().to_string()));
        for (key, value) in inputs {
            if key != "task" {
                workflow_inputs.insert(key.clone(), value.clone());
            }
        }
        let body = json!({
            "inputs": workflow_inputs,
            "response_mode": RESPONSE_MODE,
            "user": self.config.user,
        });

        let response = self.post_json("workflows/run", &body).await?;
        let parsed: WorkflowResponse =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    reason: format!("workflow reply is not valid JSON: {e}"),
                })?;
        let data = parsed.data.ok_or_else(|| UpstreamError::InvalidResponse {
            reason: "workflow reply has no data".to_string(),
        })?;

        if data.status.as_deref() == Some("failed") {
            return Err(UpstreamError::Status {
                status: 500,
                message: error_detail(data.error.as_deref().unwrap_or("workflow run failed")),
            });
        }

        UpstreamReply {
            answer: workflow_answer(data.outputs),
            conversation_id: None,
            message_id: parsed.workflow_run_id,
        }
        .ensure_answer()
    }

    async fn send_chat(
        &self,
        query: &str,
        user: Option<&str>,
        session: &SessionContext,
    ) -> Result<UpstreamReply, UpstreamError> {
        let mut body = json!({
            "inputs": {},
            "query": query,
            "response_mode": RESPONSE_MODE,
            "user": user.unwrap_or(&self.config.user),
        });
        if let Some(conversation_id) = session.conversation_id.as_deref()
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert(
                "conversation_id".to_string(),
                Value::String(conversation_id.to_string()),
            );
        }

        let response = self.post_json("chat-messages", &body).await?;
        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    reason: format!("chat reply is not valid JSON: {e}"),
                })?;

        UpstreamReply {
            answer: parsed.answer,
            conversation_id: parsed.conversation_id,
            message_id: parsed.message_id,
        }
        .ensure_answer()
    }
}

/// `outputs.result` when it carries something, else the outputs object.
fn workflow_answer(outputs: Value) -> Value {
    let Value::Object(mut obj) = outputs else {
        return outputs;
    };
    match obj.remove("result") {
        Some(result) if !super::is_blank_answer(&result) => result,
        _ => Value::Object(obj),
    }
}

#[async_trait]
impl UpstreamGateway for DifyClient {
    async fn invoke(
        &self,
        call: &UpstreamCall,
        session: &SessionContext,
    ) -> Result<UpstreamReply, UpstreamError> {
        tracing::debug!(call = call.label(), "invoking upstream");
        match call {
            UpstreamCall::Task { kind, inputs } => self.run_workflow(*kind, inputs).await,
            UpstreamCall::Query { text, user } => {
                self.send_chat(text, user.as_deref(), session).await
            }
        }
    }

    fn name(&self) -> &str {
        "dify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(api_key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            api_key: api_key.map(|key| SecretString::from(key.to_string())),
            user: "tester".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = DifyClient::new(config(Some("app-key"))).expect("client");
        assert_eq!(
            client.endpoint("workflows/run"),
            "http://127.0.0.1:9/v1/workflows/run"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_at_request_time() {
        let client = DifyClient::new(config(None)).expect("client builds without key");
        let err = client
            .invoke(&UpstreamCall::query("hello"), &SessionContext::new())
            .await
            .expect_err("no key");
        assert!(matches!(err, UpstreamError::MissingApiKey));

        let blank = DifyClient::new(config(Some("  "))).expect("client");
        assert!(matches!(blank.api_key(), Err(UpstreamError::MissingApiKey)));
    }

    #[test]
    fn workflow_answer_prefers_result() {
        assert_eq!(
            workflow_answer(json!({"result": "1. a", "other": 1})),
            json!("1. a")
        );
        assert_eq!(
            workflow_answer(json!({"result": "", "personas": []})),
            json!({"personas": []})
        );
        assert_eq!(workflow_answer(json!({"result": "  "})), json!({}));
        assert_eq!(workflow_answer(json!("plain")), json!("plain"));
    }
}
