//! HTTP gateway for toolchat.
//!
//! A thin shell around the agent loop:
//! - `POST /chat` runs one chat turn
//! - `GET /threads/{thread_id}` returns a thread's persisted history
//! - `GET /ping` is a fixed liveness probe
//! - `GET /health` also reports whether the model backend is reachable
//!
//! Built on Axum, with CORS for the configured browser origins.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use toolchat_agent::AgentLoop;
use toolchat_config::{AppConfig, GatewayConfig};
use toolchat_core::error::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers: request body limit, CORS for `config.cors_origins` (credentials
/// allowed), HTTP trace logging.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/chat", post(api::chat_handler))
        .route("/threads/{thread_id}", get(api::thread_handler))
        .route("/ping", get(api::ping_handler))
        .route("/health", get(api::health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials rule out wildcards, so methods and headers are mirrored.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Serve `state` on the configured address until the process is stopped.
pub async fn serve(state: SharedState, config: &GatewayConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state, config);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

/// Start the gateway HTTP server.
///
/// Builds the model backend, store, and tools once and shares them across
/// all requests.
pub async fn start(config: AppConfig) -> Result<(), Error> {
    let agent = toolchat_agent::build_from_config(&config).await?;
    let state = Arc::new(GatewayState {
        agent: Arc::new(agent),
    });
    serve(state, &config.gateway)
        .await
        .map_err(|e| Error::Internal(format!("gateway server failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use toolchat_core::error::ProviderError;
    use toolchat_core::message::{Message, ToolCall};
    use toolchat_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use toolchat_store::InMemoryStore;
    use tower::ServiceExt;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Message>>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let message = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Message::assistant("script exhausted"));
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "scripted".into(),
            })
        }
    }

    fn app_with(script: Vec<Message>, max_rounds: u32) -> Router {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(script.into()),
        });
        let mut config = AppConfig::default();
        config.agent.max_rounds = max_rounds;
        let agent =
            AgentLoop::from_config(&config, provider, Arc::new(InMemoryStore::new())).unwrap();
        build_router(
            Arc::new(GatewayState {
                agent: Arc::new(agent),
            }),
            &config.gateway,
        )
    }

    fn app(script: Vec<Message>) -> Router {
        app_with(script, 8)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "pong"}));
    }

    #[tokio::test]
    async fn health_endpoint() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_backend"], "reachable");
    }

    #[tokio::test]
    async fn chat_returns_answer_and_thread() {
        let app = app(vec![Message::assistant("Hello from the model")]);
        let response = app
            .oneshot(post_json(
                "/chat",
                r#"{"user_message": "hi", "thread_id": "t1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"response_content": "Hello from the model", "thread_id": "t1"})
        );
    }

    #[tokio::test]
    async fn malformed_body_is_422() {
        let response = app(vec![])
            .oneshot(post_json("/chat", r#"{"user_message": "missing thread"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("thread_id"), "{detail}");
    }

    #[tokio::test]
    async fn invalid_json_is_422() {
        let response = app(vec![])
            .oneshot(post_json("/chat", r#"{"user_message": "#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn missing_content_type_is_415() {
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .body(Body::from(r#"{"user_message": "hi", "thread_id": "t"}"#))
            .unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body_json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(VecDeque::new()),
        });
        let mut config = AppConfig::default();
        config.gateway.max_body_bytes = 64;
        let agent =
            AgentLoop::from_config(&config, provider, Arc::new(InMemoryStore::new())).unwrap();
        let app = build_router(
            Arc::new(GatewayState {
                agent: Arc::new(agent),
            }),
            &config.gateway,
        );

        let body = json!({"user_message": "x".repeat(256), "thread_id": "t"}).to_string();
        let response = app.oneshot(post_json("/chat", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn empty_thread_id_is_422() {
        let response = app(vec![])
            .oneshot(post_json("/chat", r#"{"user_message": "hi", "thread_id": " "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn runaway_model_is_500() {
        let script = (0..5)
            .map(|i| {
                Message::tool_request(vec![ToolCall::new(
                    format!("c{i}"),
                    "calculator",
                    json!({"first_operand": 1, "second_operand": 1, "operation": "add"}),
                )])
            })
            .collect();
        let response = app_with(script, 2)
            .oneshot(post_json("/chat", r#"{"user_message": "x", "thread_id": "t"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Agent runtime error:"), "{detail}");
    }

    #[tokio::test]
    async fn thread_history_is_visible() {
        let app = app(vec![Message::assistant("stored answer")]);
        app.clone()
            .oneshot(post_json("/chat", r#"{"user_message": "q", "thread_id": "abc"}"#))
            .await
            .unwrap();

        let req = Request::builder()
            .uri("/threads/abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["thread_id"], "abc");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["content"], "stored answer");
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn cors_ignores_unknown_origin() {
        let req = Request::builder()
            .uri("/ping")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
