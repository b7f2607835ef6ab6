use super::{ChatError, ChatResult, CompletionBackend, FragmentSink};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "ft:gpt-4o-2024-08-06:personal::AHGufXhY";

/// Hosted OpenAI-compatible chat-completions backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn from_env(api_key: String) -> Self {
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            client: Client::new(),
            base_url,
            model,
            api_key,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChoiceDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub delta: Option<ChoiceDelta>,
}

#[derive(Deserialize)]
pub struct CompletionChunk {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct ContentOnly {
    pub content: String,
}

/// Parse the payload of one SSE event from a chat-completions stream.
/// Returns the text fragment (possibly empty) and whether the stream is
/// finished.
pub fn parse_completion_sse_data(data: &str) -> Option<(String, bool)> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == "[DONE]" {
        return Some((String::new(), true));
    }

    if let Ok(parsed) = serde_json::from_str::<CompletionChunk>(trimmed) {
        if let Some(first) = parsed.choices.into_iter().next() {
            if let Some(delta) = first.delta
                && let Some(piece) = delta.content
            {
                return Some((piece, false));
            }
            if let Some(msg) = first.message {
                return Some((msg.content, false));
            }
        }
        return Some((String::new(), false));
    }

    if let Ok(parsed) = serde_json::from_str::<ContentOnly>(trimmed) {
        return Some((parsed.content, false));
    }

    None
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn stream(&self, messages: &[ChatMessage], sink: FragmentSink) -> ChatResult<()> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .json(&CompletionRequest {
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

        // Parse SSE by lines. Collect consecutive data: lines until a blank
        // line, then process the accumulated event payload.
        let mut buffer = String::new();
        let mut data_acc: Option<String> = None;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => {
                    let chunk = String::from_utf8_lossy(&bytes);
                    buffer.push_str(&chunk);
                    while let Some(pos) = buffer.find('\n') {
                        let mut line = buffer[..pos].to_string();
                        if line.ends_with('\r') {
                            line.pop();
                        }
                        buffer = buffer[pos + 1..].to_string();

                        if line.is_empty() {
                            // End of event
                            if let Some(data) = data_acc.take()
                                && let Some((piece, done)) = parse_completion_sse_data(&data)
                            {
                                if !piece.is_empty() {
                                    sink.push(&piece);
                                }
                                if done {
                                    return Ok(());
                                }
                            }
                            continue;
                        }

                        if let Some(rest) = line.strip_prefix("data:") {
                            let fragment = rest.trim_start();
                            match &mut data_acc {
                                Some(acc) => acc.push_str(fragment),
                                None => data_acc = Some(fragment.to_string()),
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

#[cfg(test)]
mod tests {
    use super::parse_completion_sse_data;

    #[test]
    fn parses_completion_data() {
        assert!(parse_completion_sse_data("").is_none());
        assert_eq!(
            parse_completion_sse_data("[DONE]"),
            Some((String::new(), true))
        );
        assert_eq!(
            parse_completion_sse_data(r#"{"choices":[{"delta":{"content":"hello"}}]}"#),
            Some(("hello".to_string(), false))
        );
        assert_eq!(
            parse_completion_sse_data(r#"{"choices":[{"message":{"content":"full"}}]}"#),
            Some(("full".to_string(), false))
        );
        assert_eq!(
            parse_completion_sse_data(r#"{"content":"hi"}"#),
            Some(("hi".to_string(), false))
        );
    }

    #[test]
    fn empty_delta_is_not_terminal() {
        // role-only first chunk carries no content
        assert_eq!(
            parse_completion_sse_data(r#"{"choices":[{"delta":{}}]}"#),
            Some((String::new(), false))
        );
    }
}
