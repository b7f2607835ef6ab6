//! Completion backends for ricci-chat.
//!
//! Every provider satisfies one contract: given a conversation, push
//! incremental text fragments into a [`FragmentSink`] until the provider
//! stream ends or errors. The relay turns the receiving half of the sink
//! into the chunked HTTP response body.
//!
//! Backend selection is environment-driven, see [`backend_from_env`].

mod ollama;
mod openai;

use crate::types::ChatMessage;
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider error {status}: {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0}")]
    Config(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Delivery side of one relay stream.
///
/// Fragments pushed here are forwarded verbatim, one channel entry per
/// fragment; empty fragments are dropped at the sink so they never reach
/// the wire. Dropping the sink closes the stream cleanly.
#[derive(Clone)]
pub struct FragmentSink {
    tx: mpsc::UnboundedSender<ChatResult<String>>,
}

impl FragmentSink {
    /// Create a sink and the receiving half the relay bridges into a body
    /// stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatResult<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward one fragment. A receiver that has gone away (the client
    /// disconnected mid-stream) is ignored; the backend read loop notices
    /// on its own when the provider closes.
    pub fn push(&self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        let _ = self.tx.send(Ok(fragment.to_owned()));
    }

    /// Surface a provider failure on the stream, aborting the response
    /// body so the caller can tell a failed stream from a finished one.
    pub fn fail(&self, err: ChatError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Streaming completion capability: a conversation in, a lazy sequence
/// of text fragments out, terminated or erroring.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream(&self, messages: &[ChatMessage], sink: FragmentSink) -> ChatResult<()>;
}

/// Pick a backend from the environment.
///
/// Priority order:
/// 1. OPENAI_API_KEY → hosted OpenAI-compatible endpoint
/// 2. LLM_USE_OLLAMA=true → local Ollama
pub fn backend_from_env() -> ChatResult<Arc<dyn CompletionBackend>> {
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        tracing::info!("using hosted OpenAI-compatible completion backend");
        return Ok(Arc::new(OpenAiBackend::from_env(key)));
    }

    let use_ollama = matches!(
        env::var("LLM_USE_OLLAMA")
            .unwrap_or_else(|_| "false".into())
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    );
    if use_ollama {
        tracing::info!("using local Ollama completion backend");
        return Ok(Arc::new(OllamaBackend::from_env()));
    }

    Err(ChatError::Config(
        "No completion provider configured. Set OPENAI_API_KEY for a hosted endpoint or LLM_USE_OLLAMA=true for local Ollama.".into(),
    ))
}
