use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{
    validate_base_url, validate_model_name, ChatMessage, ChatOptions, ChatRequest, LlmClient,
};
use super::InferenceError;

/// Ollama HTTP client for local chat inference (`/api/chat`).
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Build a client. The URL is checked before any request is made.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        allow_remote: bool,
    ) -> Result<Self, InferenceError> {
        validate_base_url(base_url, allow_remote)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::blocking::Response, InferenceError> {
        validate_model_name(&request.model)?;

        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            options: request.options,
        };

        debug!(
            model = %request.model,
            prompt_chars = request.prompt_chars(),
            images = request.image_count(),
            stream,
            "Sending chat request"
        );

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                InferenceError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                InferenceError::Transport(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                InferenceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

/// Response body (or one NDJSON line when streaming) from /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl LlmClient for OllamaClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, InferenceError> {
        let response = self.send(request, false)?;
        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(InferenceError::ResponseParsing(error));
        }
        parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| InferenceError::ResponseParsing("response has no message".into()))
    }

    fn chat_streaming(
        &self,
        request: &ChatRequest,
        token_tx: Sender<String>,
    ) -> Result<String, InferenceError> {
        let response = self.send(request, true)?;
        collect_stream(BufReader::new(response), Some(&token_tx))
    }
}

/// Read an NDJSON chat stream to completion, forwarding each fragment.
///
/// A send failure (receiver dropped) does not stop the read. A stream that
/// ends before its `done` chunk is a transport error, not a short answer.
pub fn collect_stream<R: BufRead>(
    reader: R,
    token_tx: Option<&Sender<String>>,
) -> Result<String, InferenceError> {
    let mut full = String::new();
    let mut done = false;
    for line in reader.lines() {
        let line = line.map_err(|e| InferenceError::Transport(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: OllamaChatResponse = serde_json::from_str(&line)
            .map_err(|e| InferenceError::ResponseParsing(format!("stream line: {e}")))?;

        if let Some(error) = chunk.error {
            return Err(InferenceError::ResponseParsing(error));
        }
        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                if let Some(tx) = token_tx {
                    let _ = tx.send(message.content.clone());
                }
                full.push_str(&message.content);
            }
        }
        if chunk.done {
            done = true;
            break;
        }
    }
    if !done {
        return Err(InferenceError::Transport(format!(
            "stream ended before done ({} chars received)",
            full.chars().count()
        )));
    }
    Ok(full)
}

// ── Mock for testing ──────────────────────────────────────

/// Mock LLM client: records every request and replays scripted outcomes.
///
/// Scripted results are consumed in call order; once exhausted every call
/// returns the default reply.
pub struct MockLlmClient {
    default_reply: String,
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(default_reply: &str) -> Self {
        Self {
            default_reply: default_reply.to_string(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(self, reply: &str) -> Self {
        self.push(Ok(reply.to_string()))
    }

    pub fn then_fail(self, error: InferenceError) -> Self {
        self.push(Err(error))
    }

    fn push(self, outcome: Result<String, InferenceError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl LlmClient for MockLlmClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, InferenceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}
