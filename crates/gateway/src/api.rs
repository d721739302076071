//! Request handlers and their wire types.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use toolchat_core::error::{AgentError, Error};
use toolchat_core::message::{ConversationId, Message};
use tracing::{error, info};

use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response_content: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_backend: &'static str,
}

/// A failed request, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// The body could not be read as a chat request (413, 415, 422, ...)
    Rejected(StatusCode, String),
    /// The request parsed but is unusable (422)
    Unprocessable(String),
    /// The agent failed while handling it (500)
    Runtime(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            other => other.status(),
        };
        Self::Rejected(status, rejection.body_text())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Agent(AgentError::InvalidRequest(msg)) => Self::Unprocessable(msg),
            other => Self::Runtime(format!("Agent runtime error: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Rejected(status, detail) => (status, detail),
            Self::Unprocessable(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            Self::Runtime(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// `POST /chat`
pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    info!(
        thread_id = %request.thread_id,
        message_len = request.user_message.len(),
        "Chat request received"
    );

    let thread_id = ConversationId::from(request.thread_id);
    let turn = state
        .agent
        .run(&thread_id, &request.user_message)
        .await
        .inspect_err(|e| error!(thread_id = %thread_id, error = %e, "Chat request failed"))?;

    Ok(Json(ChatResponse {
        response_content: turn.response,
        thread_id: turn.thread_id.0,
    }))
}

/// `GET /threads/{thread_id}`
pub async fn thread_handler(
    State(state): State<SharedState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let conversation = state
        .agent
        .history(&ConversationId::from(thread_id))
        .await?;
    Ok(Json(ThreadResponse {
        thread_id: conversation.id.0,
        messages: conversation.messages,
    }))
}

/// `GET /ping`
pub async fn ping_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

/// `GET /health`
///
/// Always 200 while the process serves requests; `status` degrades when the
/// model backend does not answer its probe.
pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let reachable = state.agent.backend_reachable().await;
    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        model_backend: if reachable { "reachable" } else { "unreachable" },
    })
}
