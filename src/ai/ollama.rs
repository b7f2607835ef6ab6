use super::{ChatError, ChatResult, CompletionBackend, FragmentSink};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_MODEL: &str = "gpt-oss:20b";
const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

/// Local Ollama chat backend, streaming newline-delimited JSON chunks.
pub struct OllamaBackend {
    client: Client,
    model: String,
    endpoint: String,
}

impl OllamaBackend {
    pub fn from_env() -> Self {
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self {
            client: Client::new(),
            model,
            endpoint: format!("{}/api/chat", host.trim_end_matches('/')),
        }
    }
}

#[derive(serde::Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize, Debug)]
pub struct StreamChunkMessage {
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct StreamChunk {
    pub message: Option<StreamChunkMessage>,
    pub done: Option<bool>,
}

pub fn parse_chat_stream_line(line_with_ws: &str) -> Option<(String, bool)> {
    let line = line_with_ws.trim();
    if line.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<StreamChunk>(line) {
        let mut piece = String::new();
        if let Some(msg) = parsed.message {
            piece.push_str(&msg.content);
        }
        let done = parsed.done.unwrap_or(false);
        return Some((piece, done));
    }
    None
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn stream(&self, messages: &[ChatMessage], sink: FragmentSink) -> ChatResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&OllamaChatRequest {
                model: &self.model,
                messages,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream { status, body });
        }

        let mut buffer = String::new();
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => {
                    let chunk = String::from_utf8_lossy(&bytes);
                    buffer.push_str(&chunk);
                    while let Some(pos) = buffer.find('\n') {
                        let line = buffer[..pos].to_string();
                        buffer = buffer[pos + 1..].to_string();
                        if let Some((piece, done)) = parse_chat_stream_line(&line) {
                            if !piece.is_empty() {
                                sink.push(&piece);
                            }
                            if done {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(err) => return Err(ChatError::from(err)),
            }
        }

        Ok(())
    }
}
