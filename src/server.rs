//! HTTP surface: the chat page and the streaming relay endpoint.
//!
//! `POST /api/chat` is a pure relay. The handler validates the incoming
//! conversation, prepends the fixed system instruction, and bridges the
//! provider's fragment stream straight into the chunked response body.
//! Nothing is buffered beyond the fragment in flight.

use crate::ai::{CompletionBackend, FragmentSink, backend_from_env};
use crate::types::ChatMessage;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};

/// Instruction prepended to every outbound conversation. Static
/// configuration, not user-editable.
const SYSTEM_PROMPT: &str =
    "You are a helpful assistant who understands the Ricci package and can respond with Mathematica.";

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

const CHAT_PAGE: &str = include_str!("../assets/index.html");

pub struct RelayState {
    backend: Arc<dyn CompletionBackend>,
}

impl RelayState {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

pub type AppState = Arc<RelayState>;

/// Accepted request bodies: the full conversation (preferred) or the
/// legacy single-turn `{ "content": ... }` form, treated as a
/// one-message conversation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Conversation(Vec<ChatMessage>),
    Single { content: String },
}

impl ChatRequest {
    fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            ChatRequest::Conversation(messages) => messages,
            ChatRequest::Single { content } => vec![ChatMessage::user(content)],
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: reason.to_string(),
        }),
    )
        .into_response()
}

fn validate(messages: &[ChatMessage]) -> Result<(), &'static str> {
    if messages.is_empty() {
        return Err("conversation is empty");
    }
    if messages.iter().all(|msg| msg.content.trim().is_empty()) {
        return Err("conversation has no content");
    }
    Ok(())
}

// POST /api/chat
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let conversation = request.into_messages();
    if let Err(reason) = validate(&conversation) {
        return bad_request(reason);
    }

    tracing::debug!(messages = conversation.len(), "opening relay stream");

    let mut outbound = Vec::with_capacity(conversation.len() + 1);
    outbound.push(ChatMessage::system(SYSTEM_PROMPT));
    outbound.extend(conversation);

    let (sink, rx) = FragmentSink::channel();
    tokio::spawn(relay(state.backend.clone(), outbound, sink));

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(UnboundedReceiverStream::new(rx)),
    )
        .into_response()
}

/// Drive one provider stream to completion. Dropping the sink at the end
/// closes the response body; a provider error is surfaced on the body
/// stream instead, so the client can tell an aborted stream from a
/// finished one.
async fn relay(backend: Arc<dyn CompletionBackend>, messages: Vec<ChatMessage>, sink: FragmentSink) {
    match backend.stream(&messages, sink.clone()).await {
        Ok(()) => tracing::debug!("provider stream finished"),
        Err(err) => {
            tracing::warn!("provider stream failed: {err}");
            sink.fail(err);
        }
    }
}

// GET /
async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(chat_page))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    let backend = backend_from_env()?;
    let state = Arc::new(RelayState::new(backend));

    let addr = std::env::var("CHAT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ricci-chat listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
