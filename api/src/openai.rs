//! Language-model collaborator client over the Responses API contract.
//!
//! Upstream failures are converted to typed [`LlmError`] variants at this
//! boundary; raw provider error bodies never travel further than the logs.

use std::time::Duration;

use futures::stream::BoxStream;
use futures::{StreamExt, future, stream};
use serde_json::{Value, json};

use calchat_core::sanitize::{rate_limit_message, sanitize_error_message};

use crate::config::OpenAiConfig;
use crate::retry::retry_with_backoff;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

const NON_STREAMING_ATTEMPTS: u32 = 3;
const STREAMING_ATTEMPTS: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Guidance appended to every request's instructions: the model must flag
/// mutating calendar operations for confirmation and keep tool arguments
/// well-formed.
const CONFIRMATION_GUIDANCE: &str = "\n\nImportant:\n\
- For calendar modifications (create, edit, delete, reschedule), ALWAYS indicate that user confirmation is required before executing the action.\n\
- For calendar reading operations, provide the information directly.\n\
- When suggesting calendar changes, be specific about what will be created or modified and ask for confirmation.\n\
- For calendar event creation/updates passed to tools: use default reminders, ensure end time is after start time, resolve relative dates (\"tomorrow\", \"next Monday\") to absolute ones, and pass all relevant details (summary, location, attendees, description, recurrence) to the tool.\n";

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("rate limit")]
    RateLimited,
    #[error("API key invalid")]
    InvalidApiKey,
    #[error("language model service unavailable")]
    Unavailable,
    /// Raw failure text, for logs. Sanitized exactly once at the boundary.
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// The user-safe string for this failure.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::RateLimited => rate_limit_message("rate limit").to_string(),
            LlmError::InvalidApiKey => sanitize_error_message("API key").to_string(),
            LlmError::Unavailable => rate_limit_message("unavailable").to_string(),
            LlmError::Other(raw) => sanitize_error_message(raw).to_string(),
        }
    }
}

/// What the conversation endpoint consumes: continuation id, flattened text,
/// and the raw tool-invocation records for intent detection.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub id: String,
    pub content: String,
    pub tool_calls: Vec<Value>,
    pub finish_reason: String,
}

impl ModelResponse {
    /// Build from a raw Responses API body.
    pub fn from_raw(raw: &Value) -> Self {
        let content = raw["output_text"]
            .as_str()
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| extract_content_from_output(&raw["output"]));

        let tool_calls = raw["output"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item["type"] == "mcp_call")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: raw["id"].as_str().unwrap_or_default().to_string(),
            content,
            tool_calls,
            finish_reason: raw["status"].as_str().unwrap_or("completed").to_string(),
        }
    }
}

/// Flatten `output[].content[].text` from message items into one string.
fn extract_content_from_output(output: &Value) -> String {
    if let Some(text) = output.as_str() {
        return text.to_string();
    }
    let Some(items) = output.as_array() else {
        return String::new();
    };

    items
        .iter()
        .filter(|item| item["type"] == "message")
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .join(" \n")
}

pub struct ResponseParams<'a> {
    pub input: &'a str,
    pub instructions: &'a str,
    pub previous_response_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: OpenAiConfig,
    /// MCP tool entry for the request tools list, when configured
    tool: Option<Value>,
}

impl LlmClient {
    pub fn new(config: OpenAiConfig, tool: Option<Value>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tool,
        }
    }

    /// One conversation turn. Retried with exponential backoff.
    pub async fn create_response(
        &self,
        params: &ResponseParams<'_>,
    ) -> Result<ModelResponse, LlmError> {
        retry_with_backoff(NON_STREAMING_ATTEMPTS, INITIAL_BACKOFF, || async {
            let resp = self.send_request(params, false).await?;
            let raw: Value = resp
                .json()
                .await
                .map_err(|e| LlmError::Other(format!("parse: {e}")))?;
            Ok(ModelResponse::from_raw(&raw))
        })
        .await
    }

    /// Open a streaming conversation turn, yielding incremental text deltas
    /// until the upstream `[DONE]` sentinel. Only establishing the stream is
    /// retried; mid-stream failures surface as stream items.
    pub async fn create_streaming_response(
        &self,
        params: &ResponseParams<'_>,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let resp = retry_with_backoff(STREAMING_ATTEMPTS, INITIAL_BACKOFF, || {
            self.send_request(params, true)
        })
        .await?;

        Ok(delta_stream(resp))
    }

    async fn send_request(
        &self,
        params: &ResponseParams<'_>,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let instructions = format!("{}{}", params.instructions, CONFIRMATION_GUIDANCE);
        let tools: Vec<&Value> = self.tool.iter().collect();

        let mut body = json!({
            "model": self.config.model,
            "input": params.input,
            "instructions": instructions,
            "tools": tools,
        });
        if let Some(prev) = params.previous_response_id {
            body["previous_response_id"] = json!(prev);
        }
        if stream {
            body["stream"] = json!(true);
        }

        let resp = self
            .http
            .post(RESPONSES_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("language model request failed: {}", e);
                LlmError::Other(format!("network: {e}"))
            })?;

        match resp.status().as_u16() {
            429 => Err(LlmError::RateLimited),
            401 => Err(LlmError::InvalidApiKey),
            503 => Err(LlmError::Unavailable),
            status if status >= 400 => {
                let text = resp.text().await.unwrap_or_default();
                tracing::error!(status, "language model error response: {}", text);
                Err(LlmError::Other(text))
            }
            _ => Ok(resp),
        }
    }
}

/// Turn a streaming Responses body into a stream of text deltas.
fn delta_stream(resp: reqwest::Response) -> BoxStream<'static, Result<String, LlmError>> {
    resp.bytes_stream()
        .scan(SseBuffer::default(), |buf, chunk| {
            let items: Vec<Result<String, LlmError>> = match chunk {
                Ok(bytes) => buf.push(&bytes).into_iter().map(Ok).collect(),
                Err(e) => {
                    tracing::error!("streaming error: {}", e);
                    vec![Err(LlmError::Other(format!("network: {e}")))]
                }
            };
            future::ready(Some(stream::iter(items)))
        })
        .flatten()
        .boxed()
}

/// Incremental SSE line-protocol parser. Events arrive as `data: <json>`
/// blocks separated by blank lines; chunk boundaries can fall anywhere.
#[derive(Default)]
struct SseBuffer {
    buf: String,
    done: bool,
}

impl SseBuffer {
    /// Feed raw bytes, returning the text deltas completed by this chunk.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut deltas = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let event: String = self.buf.drain(..pos + 2).collect();
            for line in event.lines() {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    self.done = true;
                    self.buf.clear();
                    return deltas;
                }
                if let Some(text) = delta_text(data) {
                    if !text.is_empty() {
                        deltas.push(text);
                    }
                }
            }
        }
        deltas
    }
}

/// Extract the text delta from one stream event, tolerating the shapes the
/// Responses API and Chat Completions-style streams emit.
fn delta_text(data: &str) -> Option<String> {
    let event: Value = serde_json::from_str(data).ok()?;

    if event["type"] == "response.output_text.delta" {
        if let Some(text) = event["delta"].as_str() {
            return Some(text.to_string());
        }
    }
    if let Some(text) = event["output_text_delta"]["text"].as_str() {
        return Some(text.to_string());
    }
    if let Some(text) = event["choices"][0]["delta"]["content"].as_str() {
        return Some(text.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{LlmError, ModelResponse, SseBuffer, delta_text, extract_content_from_output};
    use serde_json::json;

    #[test]
    fn raw_failure_text_keeps_its_failure_class_when_sanitized() {
        assert_eq!(
            LlmError::Other("parse: expected value at line 1".to_string()).user_message(),
            "Invalid request format. Please try again."
        );
        assert_eq!(
            LlmError::Other("network: connection reset by peer".to_string()).user_message(),
            "Network error. Please check your connection and try again."
        );
        assert_eq!(
            LlmError::Other("segfault".to_string()).user_message(),
            "Something went wrong. Please retry."
        );
    }

    #[test]
    fn model_response_prefers_output_text() {
        let raw = json!({
            "id": "resp_1",
            "output_text": "You have 2 meetings today",
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "ignored"}]}],
            "status": "completed"
        });
        let resp = ModelResponse::from_raw(&raw);
        assert_eq!(resp.id, "resp_1");
        assert_eq!(resp.content, "You have 2 meetings today");
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn model_response_flattens_output_items() {
        let raw = json!({
            "id": "resp_2",
            "output": [
                {"type": "message", "content": [
                    {"type": "output_text", "text": "I can schedule"},
                    {"type": "output_text", "text": "your meeting"}
                ]},
                {"type": "mcp_call", "name": "create_event", "error": null}
            ]
        });
        let resp = ModelResponse::from_raw(&raw);
        assert_eq!(resp.content, "I can schedule \nyour meeting");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.finish_reason, "completed");
    }

    #[test]
    fn output_as_plain_string_is_kept() {
        assert_eq!(extract_content_from_output(&json!("hello")), "hello");
        assert_eq!(extract_content_from_output(&json!(null)), "");
    }

    #[test]
    fn sse_buffer_handles_split_chunks() {
        let mut buf = SseBuffer::default();
        let first = buf.push(b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel");
        assert!(first.is_empty());
        let second = buf.push(b"lo\"}\n\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\" there\"}\n\n");
        assert_eq!(second, vec!["Hello".to_string(), " there".to_string()]);
    }

    #[test]
    fn sse_buffer_stops_at_done_sentinel() {
        let mut buf = SseBuffer::default();
        let out = buf.push(
            b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"x\"}\n\ndata: [DONE]\n\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\"late\"}\n\n",
        );
        assert_eq!(out, vec!["x".to_string()]);
        assert!(buf.push(b"data: anything\n\n").is_empty());
    }

    #[test]
    fn delta_text_tolerates_alternate_shapes() {
        assert_eq!(
            delta_text(r#"{"type":"response.output_text.delta","delta":"a"}"#),
            Some("a".to_string())
        );
        assert_eq!(
            delta_text(r#"{"output_text_delta":{"text":"b"}}"#),
            Some("b".to_string())
        );
        assert_eq!(
            delta_text(r#"{"choices":[{"delta":{"content":"c"}}]}"#),
            Some("c".to_string())
        );
        assert_eq!(delta_text(r#"{"type":"response.created"}"#), None);
        assert_eq!(delta_text("not json"), None);
    }
}
