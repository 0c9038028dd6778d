//! Axum HTTP server for the BFF.
//!
//! Routes: `POST /generate` forwards one task or query to the upstream
//! gateway and normalizes the reply; `GET /api/health` reports liveness.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::channels::web::types::*;
use crate::domain::TaskKind;
use crate::error::{Error, ServerError, UpstreamError, WorkflowError};
use crate::llm::{SessionContext, UpstreamCall, UpstreamGateway, UpstreamReply};
use crate::normalize;

/// Shared state for all BFF handlers.
pub struct BffState {
    /// Upstream generation service.
    pub gateway: Arc<dyn UpstreamGateway>,
    /// Caller-side timeout around each upstream call.
    pub timeout: Duration,
    /// Maximum request body size.
    pub body_limit_bytes: usize,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    server_task: tokio::sync::Mutex<Option<JoinHandle<Result<(), ServerError>>>>,
}

impl BffState {
    pub fn new(gateway: Arc<dyn UpstreamGateway>, timeout: Duration, body_limit_bytes: usize) -> Self {
        Self {
            gateway,
            timeout,
            body_limit_bytes,
            shutdown_tx: tokio::sync::RwLock::new(None),
            server_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Stop accepting connections and wait for in-flight requests to drain.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
        match self.server_task.lock().await.take() {
            Some(task) => task
                .await
                .map_err(|e| ServerError::Serve(format!("server task failed: {e}")))?,
            None => Ok(()),
        }
    }

    async fn invoke(
        &self,
        call: &UpstreamCall,
        session: &SessionContext,
    ) -> Result<UpstreamReply, UpstreamError> {
        match tokio::time::timeout(self.timeout, self.gateway.invoke(call, session)).await {
            Ok(outcome) => outcome.and_then(UpstreamReply::ensure_answer),
            Err(_) => Err(UpstreamError::Timeout {
                timeout: self.timeout,
            }),
        }
    }
}

/// Build the BFF router. `addr` is the bound address used for CORS origins.
pub fn build_router(state: Arc<BffState>, addr: SocketAddr) -> Router {
    // Only same-host browser origins are allowed.
    let origins = [
        format!("http://{}:{}", addr.ip(), addr.port()),
        format!("http://localhost:{}", addr.port()),
    ]
    .into_iter()
    .filter_map(|origin| origin.parse().ok())
    .collect::<Vec<HeaderValue>>();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE]));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/generate", post(generate_handler))
        .route("/api/generate", post(generate_handler))
        .layer(cors)
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the BFF HTTP server.
///
/// Returns the bound address (useful when `addr` has port 0).
pub async fn start_server(addr: SocketAddr, state: Arc<BffState>) -> Result<SocketAddr, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound_addr = listener.local_addr().map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        reason: format!("failed to get local addr: {e}"),
    })?;

    let app = build_router(state.clone(), bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("BFF server shutting down");
            })
            .await
            .map_err(|e| {
                tracing::error!("BFF server error: {}", e);
                ServerError::Serve(e.to_string())
            })
    });
    *state.server_task.lock().await = Some(task);

    tracing::info!(addr = %bound_addr, "BFF server listening");
    Ok(bound_addr)
}

async fn health_handler(State(state): State<Arc<BffState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        channel: "bff",
        upstream: state.gateway.name().to_string(),
    })
}

type GenerateReply = (StatusCode, Json<GenerateResponse>);

enum GenerateRoute {
    Task {
        kind: TaskKind,
        inputs: Map<String, Value>,
    },
    Query {
        text: String,
        conversation_id: Option<String>,
        user: Option<String>,
    },
}

fn route_request(request: GenerateRequest) -> Result<GenerateRoute, String> {
    let task = request.task.filter(|t| !t.trim().is_empty());
    let query = request.query.filter(|q| !q.trim().is_empty());

    match (task, request.inputs, query) {
        (Some(task), Some(inputs), _) => {
            let kind = task.parse::<TaskKind>()?;
            Ok(GenerateRoute::Task { kind, inputs })
        }
        (None, _, Some(text)) => Ok(GenerateRoute::Query {
            text,
            conversation_id: request.conversation_id,
            user: request.user.filter(|u| !u.trim().is_empty()),
        }),
        _ => Err("Task and inputs are required".to_string()),
    }
}

fn bad_request(task: Option<&str>, message: String) -> GenerateReply {
    let payload = WorkflowError::Validation(message).to_error_payload();
    (
        StatusCode::BAD_REQUEST,
        Json(GenerateResponse::failed(task, &payload)),
    )
}

fn upstream_failure(task: Option<&str>, error: UpstreamError) -> GenerateReply {
    let payload = Error::from(error).to_error_payload();
    tracing::warn!(
        task = task.unwrap_or("query"),
        code = payload.code,
        "upstream call failed: {}",
        payload.message
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(GenerateResponse::failed(task, &payload)),
    )
}

async fn generate_handler(
    State(state): State<Arc<BffState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> GenerateReply {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return bad_request(None, format!("invalid request body: {}", rejection.body_text()));
        }
    };

    match route_request(request) {
        Err(message) => bad_request(None, message),
        Ok(GenerateRoute::Task { kind, inputs }) => run_task(&state, kind, inputs).await,
        Ok(GenerateRoute::Query {
            text,
            conversation_id,
            user,
        }) => run_query(&state, text, conversation_id, user).await,
    }
}

async fn run_task(state: &BffState, kind: TaskKind, inputs: Map<String, Value>) -> GenerateReply {
    tracing::info!(task = %kind, "BFF task request");
    let task = Some(kind.as_str());
    let reply = match state
        .invoke(&UpstreamCall::task(kind, inputs), &SessionContext::new())
        .await
    {
        Ok(reply) => reply,
        Err(e) => return upstream_failure(task, e),
    };

    let data = match normalize::normalize(kind, &reply.answer) {
        Ok(normalized) => normalized.to_value(),
        Err(e) => {
            // Clients render an empty list as "nothing to select".
            tracing::warn!(task = %kind, "{}", e);
            Value::Array(Vec::new())
        }
    };
    (StatusCode::OK, Json(GenerateResponse::ok(task, data)))
}

async fn run_query(
    state: &BffState,
    text: String,
    conversation_id: Option<String>,
    user: Option<String>,
) -> GenerateReply {
    let session = conversation_id
        .map(SessionContext::with_conversation)
        .unwrap_or_default();
    let call = UpstreamCall::Query { text, user };

    match state.invoke(&call, &session).await {
        Ok(reply) => {
            let session = session.updated(&reply);
            let answer = QueryAnswer {
                answer: reply.answer,
                conversation_id: session.conversation_id,
                message_id: reply.message_id,
            };
            let data = serde_json::to_value(answer).unwrap_or(Value::Null);
            (StatusCode::OK, Json(GenerateResponse::ok(None, data)))
        }
        Err(e) => upstream_failure(None, e),
    }
}
