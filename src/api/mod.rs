//! HTTP API server for LaunchAgent.

// Allow clippy lint triggered by utoipa's OpenApi derive macro
#![allow(clippy::needless_for_each)]

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{self, Sse},
    },
    routing::{get, post},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use stream_protocol::{Event, ProtocolError};
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Config, ParserConfig};
use crate::core::USER_FACING_FAILURE;
use crate::core::agent::{self, CompletionRequest, LlmProvider, Message};

/// Shared application state.
pub struct AppState {
    /// The LLM provider (if an API key is configured).
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Parser settings for new sessions.
    pub parser: ParserConfig,

    /// Model to request.
    pub model: String,

    /// Token budget per turn.
    pub max_tokens: u32,

    /// Director system prompt.
    pub system: Option<String>,

    /// API token for authentication (if configured).
    pub token: Option<String>,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// A missing API key only disables the chat endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured system prompt cannot be read.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider: Option<Arc<dyn LlmProvider>> = match config.agent.create_provider() {
            Ok(provider) => Some(Arc::from(provider)),
            Err(e) => {
                tracing::warn!(error = %e, "chat endpoint disabled");
                None
            }
        };
        let system = agent::load_system_prompt(config.agent.system_prompt.as_deref())?;

        Ok(Self {
            provider,
            parser: config.parser.clone(),
            model: config.agent.model.clone(),
            max_tokens: config.agent.max_tokens,
            system,
            token: config.api.token(),
        })
    }
}

type SharedState = Arc<AppState>;

/// `OpenAPI` documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LaunchAgent API",
        description = "Streaming markup decoding and director turns",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(health, parse_chunk, chat_stream),
    components(schemas(ParseRequest, ParseResponse, ChatRequest, ErrorResponse))
)]
struct ApiDoc;

/// Authentication middleware.
///
/// Validates the `Authorization: Bearer <token>` header if a token is configured.
async fn auth_middleware(
    State(state): State<SharedState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    // If no token configured, allow all requests (localhost-only mode)
    let Some(ref expected_token) = state.token else {
        return next.run(request).await;
    };

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match auth_header {
        Some(token) if token == expected_token => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "Missing or invalid Authorization header. Use: Bearer <token>"
                    .to_string(),
            }),
        )
            .into_response(),
    }
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    // Protected routes (require auth if token configured)
    let protected_routes = Router::new()
        .route("/api/parse", post(parse_chunk))
        .route("/api/chat/stream", post(chat_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP API server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or start.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state: SharedState = Arc::new(AppState::from_config(config)?);
    let auth_enabled = state.token.is_some();
    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if auth_enabled {
        tracing::info!(addr = %addr, "starting HTTP API server (auth enabled)");
    } else {
        tracing::warn!(addr = %addr, "starting HTTP API server (NO AUTH - localhost only recommended)");
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service healthy", body = String))
)]
async fn health() -> &'static str {
    "ok"
}

/// Request body for one parser step.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ParseRequest {
    /// Remaining buffer from the previous call.
    #[serde(default)]
    pub buffer: String,

    /// Newly received text.
    #[serde(default)]
    pub chunk: String,

    /// Whether this is the end of the stream.
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

/// Response body for one parser step.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ParseResponse {
    /// Decoded events.
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<Event>,

    /// Buffer to send with the next chunk.
    pub remaining_buffer: String,
}

/// Request body for a director turn.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatRequest {
    /// The user message.
    pub prompt: String,

    /// Earlier messages of the conversation, oldest first.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<Message>,
}

/// Error body.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn protocol_error(e: &ProtocolError) -> ApiError {
    tracing::warn!(error = %e, "parse request failed");
    let (status, code) = match e {
        ProtocolError::Truncated { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "truncated"),
        ProtocolError::PendingOverflow { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "overflow"),
        ProtocolError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: USER_FACING_FAILURE.to_string(),
        }),
    )
}

/// Decode one chunk against a client-held buffer.
#[utoipa::path(
    post,
    path = "/api/parse",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Chunk decoded", body = ParseResponse),
        (status = 413, description = "Pending buffer too large", body = ErrorResponse),
        (status = 422, description = "Stream ended inside a tag", body = ErrorResponse)
    )
)]
async fn parse_chunk(
    State(state): State<SharedState>,
    Json(req): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    let mut session = state.parser.session().with_buffer(req.buffer);

    let mut events = session.feed(&req.chunk).map_err(|e| protocol_error(&e))?;
    if req.is_final {
        events.extend(session.finish().map_err(|e| protocol_error(&e))?);
    }

    Ok(Json(ParseResponse {
        events,
        remaining_buffer: session.pending().to_string(),
    }))
}

fn sse_frame(result: stream_protocol::Result<Event>) -> Result<sse::Event, Infallible> {
    let data = match result {
        Ok(event) => serde_json::to_string(&event).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "director turn failed");
            serde_json::json!({ "type": "error", "message": USER_FACING_FAILURE }).to_string()
        }
    };
    Ok(sse::Event::default().data(data))
}

/// Stream a director turn as server-sent events.
#[utoipa::path(
    post,
    path = "/api/chat/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "One JSON event per frame, ending with done or error"),
        (status = 502, description = "Provider rejected the request", body = ErrorResponse),
        (status = 503, description = "No API key configured", body = ErrorResponse)
    )
)]
async fn chat_stream(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<sse::Event, Infallible>>>, ApiError> {
    let Some(provider) = state.provider.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "unavailable".to_string(),
                message: "No API key configured".to_string(),
            }),
        ));
    };

    let mut messages = req.history;
    messages.push(Message::user(req.prompt));

    let request = CompletionRequest {
        model: state.model.clone(),
        max_tokens: state.max_tokens,
        messages,
        system: state.system.clone(),
    };

    let events = agent::stream_turn(&*provider, request, state.parser.session())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "provider rejected request");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "provider".to_string(),
                    message: USER_FACING_FAILURE.to_string(),
                }),
            )
        })?;

    Ok(Sse::new(events.map(sse_frame)))
}
