//! Chat model client
//!
//! A uniform wrapper over an OpenAI-compatible chat completion endpoint with
//! three invocation shapes: single round trip, token streaming, and bounded
//! concurrent batch. Provider-side problems are folded into [`ChatOutcome`]
//! instead of being raised, so callers branch on a value.

use crate::types::{
    BatchItem, BatchResult, ChatFailureKind, ChatMessage, ChatOptions, ChatOutcome, LlmConfig,
    RagError, RagResult, StreamChunk, TokenUsage,
};
use feynman_core::config_error;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default system prompt for [`ChatModelClient::quick_chat`]
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Client for a remote chat completion model
///
/// Constructed once at startup and shared read-only across concurrent calls;
/// every invocation issues an independent network request and holds no
/// per-call state on the client.
pub struct ChatModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    config: LlmConfig,
}

impl ChatModelClient {
    /// Create a new client from configuration
    ///
    /// The API key is taken from the config value or, failing that, from the
    /// environment variable named in `api_key_env`. Local endpoints do not
    /// require a key.
    pub fn new(config: LlmConfig) -> RagResult<Self> {
        let is_local =
            config.base_url.contains("localhost") || config.base_url.contains("127.0.0.1");

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                RagError::from(config_error!(
                    format!(
                        "API key not found: set it in config or via the {} environment variable",
                        config.api_key_env
                    ),
                    "llm_client"
                ))
            })?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                RagError::from(config_error!(
                    format!("Failed to build HTTP client: {}", e),
                    "llm_client"
                ))
            })?;

        info!(
            "Created chat model client for {} with model {}",
            config.base_url, config.model
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    /// Get the configured default model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the client configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Build the JSON request body, applying option fallbacks
    fn request_body(&self, messages: &[ChatMessage], options: &ChatOptions, stream: bool) -> Value {
        let mut body = json!({
            "model": options.model.as_deref().unwrap_or(&self.config.model),
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.config.temperature),
            "max_tokens": options.max_tokens.unwrap_or(self.config.max_tokens),
            "stream": stream,
        });
        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    /// Send the full message sequence in one round trip
    ///
    /// Never returns an error: transport failures, HTTP error statuses and
    /// malformed bodies all map to a classified [`ChatOutcome::Failure`].
    pub async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> ChatOutcome {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, options, false);
        let start = Instant::now();

        debug!(url = %url, messages = messages.len(), "Sending chat completion request");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return ChatOutcome::Failure {
                    kind: ChatFailureKind::Network,
                    message: format!("Failed to read response body: {}", e),
                }
            }
        };

        if !status.is_success() {
            let (kind, message) = map_http_error(status, &text);
            return ChatOutcome::Failure { kind, message };
        }

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ChatOutcome::Failure {
                    kind: ChatFailureKind::InvalidResponse,
                    message: format!("Response is not valid JSON: {}", e),
                }
            }
        };

        match parse_completion(&parsed) {
            Ok((content, usage)) => {
                debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    completion_tokens = usage.completion_tokens,
                    "Chat completion succeeded"
                );
                ChatOutcome::Success { content, usage }
            }
            Err(message) => ChatOutcome::Failure {
                kind: ChatFailureKind::InvalidResponse,
                message,
            },
        }
    }

    /// Convenience wrapper for simple call sites
    ///
    /// Builds a system + user conversation and unwraps the success content;
    /// when no system prompt is given, [`DEFAULT_SYSTEM_PROMPT`] is used.
    /// This is the one client operation that surfaces failures as an error
    /// value rather than a [`ChatOutcome`].
    pub async fn quick_chat(
        &self,
        content: &str,
        system_prompt: Option<&str>,
    ) -> RagResult<String> {
        let messages = quick_messages(content, system_prompt);

        self.chat(&messages, &ChatOptions::default())
            .await
            .into_result()
    }

    /// Open a streaming completion and deliver fragments through `on_chunk`
    ///
    /// Fragments are delivered synchronously, in order, before the next chunk
    /// is read from the connection. The returned outcome carries the full
    /// accumulated text. A mid-stream failure reports `Stream`; the partial
    /// buffer delivered so far is not promoted to a success. Dropping the
    /// future closes the underlying connection.
    pub async fn stream_chat<F>(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        mut on_chunk: F,
    ) -> ChatOutcome
    where
        F: FnMut(StreamChunk<'_>),
    {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, options, true);

        debug!(url = %url, "Opening streaming chat completion");

        // No total-request timeout here: a healthy stream can legitimately
        // outlive the single-shot budget. The connect timeout still applies.
        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (kind, message) = map_http_error(status, &text);
            return ChatOutcome::Failure { kind, message };
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut cumulative = String::new();
        let mut usage = TokenUsage::default();
        let mut done = false;

        'outer: while let Some(next) = stream.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Stream transport error after {} chars: {}", cumulative.len(), e);
                    return ChatOutcome::Failure {
                        kind: ChatFailureKind::Stream,
                        message: format!("Stream interrupted: {}", e),
                    };
                }
            };
            buffer.extend_from_slice(&bytes);

            // SSE frames are newline-delimited; a network chunk may end
            // mid-line, so only complete lines are consumed here.
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                let line = line.trim();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" {
                    done = true;
                    break 'outer;
                }

                let chunk = match parse_sse_line(line) {
                    Some(chunk) => chunk,
                    None => continue,
                };

                if let Some(chunk_usage) = usage_from_chunk(&chunk) {
                    usage = chunk_usage;
                }

                if let Some(delta) = delta_from_chunk(&chunk) {
                    if !delta.is_empty() {
                        cumulative.push_str(delta);
                        on_chunk(StreamChunk {
                            delta,
                            cumulative: &cumulative,
                            raw: &chunk,
                        });
                    }
                }
            }
        }

        if !done {
            return ChatOutcome::Failure {
                kind: ChatFailureKind::Stream,
                message: "Stream ended before completion signal".to_string(),
            };
        }

        debug!(chars = cumulative.len(), "Stream completed");
        ChatOutcome::Success {
            content: cumulative,
            usage,
        }
    }

    /// Dispatch all items concurrently and reassemble results in input order
    ///
    /// Concurrency is capped by `batch_concurrency`; each item succeeds or
    /// fails independently and the output always has one result per input,
    /// at the same index.
    pub async fn batch_chat(&self, items: Vec<BatchItem>) -> Vec<BatchResult> {
        let limit = self.config.batch_concurrency.max(1);
        let total = items.len();

        debug!(total, limit, "Dispatching batch chat");

        let results: Vec<BatchResult> = futures::stream::iter(items.into_iter().map(|item| async {
            let output = self.chat(&item.messages, &item.options).await;
            BatchResult {
                input: item,
                output,
            }
        }))
        .buffered(limit)
        .collect()
        .await;

        let failed = results.iter().filter(|r| !r.output.is_success()).count();
        if failed > 0 {
            warn!(failed, total, "Batch chat finished with failures");
        }
        results
    }
}

/// Build the two-message conversation for [`ChatModelClient::quick_chat`]
fn quick_messages(content: &str, system_prompt: Option<&str>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT)),
        ChatMessage::user(content),
    ]
}

/// Map a transport-level reqwest error into a failure outcome
fn transport_failure(error: reqwest::Error) -> ChatOutcome {
    let message = if error.is_timeout() {
        format!("Request timed out: {}", error)
    } else {
        format!("Request failed: {}", error)
    };
    ChatOutcome::Failure {
        kind: ChatFailureKind::Network,
        message,
    }
}

/// Map an HTTP error status to a failure kind and message
fn map_http_error(status: reqwest::StatusCode, body: &str) -> (ChatFailureKind, String) {
    let provider_message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    let kind = match status.as_u16() {
        401 | 403 => ChatFailureKind::Auth,
        429 => ChatFailureKind::RateLimit,
        _ => ChatFailureKind::Unknown,
    };

    (kind, format!("HTTP {}: {}", status.as_u16(), provider_message))
}

/// Extract the assistant content and usage from a completion body
fn parse_completion(body: &Value) -> Result<(String, TokenUsage), String> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| "No assistant content in response".to_string())?;

    let usage = body
        .get("usage")
        .and_then(|u| serde_json::from_value(u.clone()).ok())
        .unwrap_or_default();

    Ok((content.to_string(), usage))
}

/// Parse a single SSE data line; returns None for non-data lines and [DONE]
fn parse_sse_line(line: &str) -> Option<Value> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}

/// Extract the content delta from a streaming chunk
fn delta_from_chunk(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

/// Extract usage counters from a usage-bearing chunk
fn usage_from_chunk(chunk: &Value) -> Option<TokenUsage> {
    let usage = chunk.get("usage")?;
    if usage.is_null() {
        return None;
    }
    serde_json::from_value(usage.clone()).ok()
}
