use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::InferenceError;

// ──────────────────────────────────────────────
// Request types
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Images are base64 and only sent on user turns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            images: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: None,
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: Some(images),
        }
    }
}

/// Sampling options forwarded as Ollama `options`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

impl ChatRequest {
    /// System + user message pair, the shape every pass uses.
    pub fn new(model: &str, system: &str, user: &str, options: ChatOptions) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            options,
        }
    }

    /// System + user message with images attached to the user turn.
    pub fn with_images(
        model: &str,
        system: &str,
        user: &str,
        images: Vec<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(system),
                ChatMessage::user_with_images(user, images),
            ],
            options,
        }
    }

    pub fn image_count(&self) -> usize {
        self.messages
            .iter()
            .filter_map(|m| m.images.as_ref())
            .map(Vec::len)
            .sum()
    }

    /// Total characters across message contents.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

// ──────────────────────────────────────────────
// Client trait
// ──────────────────────────────────────────────

/// Blocking chat-completion client.
pub trait LlmClient {
    /// Send the request and block until the full reply is available.
    fn chat(&self, request: &ChatRequest) -> Result<String, InferenceError>;

    /// Like `chat`, forwarding text fragments to `token_tx` as they arrive.
    /// Returns the full text. The default sends the whole reply at once.
    fn chat_streaming(
        &self,
        request: &ChatRequest,
        token_tx: Sender<String>,
    ) -> Result<String, InferenceError> {
        let text = self.chat(request)?;
        let _ = token_tx.send(text.clone());
        Ok(text)
    }
}

// ──────────────────────────────────────────────
// Validators
// ──────────────────────────────────────────────

/// `[host/][namespace/]model[:tag]`, at most two leading path segments.
static MODEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*){0,2}(:[a-zA-Z0-9._-]+)?$")
        .expect("static regex")
});

pub fn validate_model_name(name: &str) -> Result<(), InferenceError> {
    if MODEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err(InferenceError::InvalidModelName(name.to_string()))
    }
}

/// Host part of an `http(s)://host[:port][/path]` URL, without IPv6 brackets.
fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;

    let host = if let Some(v6) = rest.strip_prefix('[') {
        v6.split(']').next()?
    } else {
        rest.split(['/', ':']).next()?
    };
    (!host.is_empty()).then_some(host)
}

/// Check the endpoint URL. Loopback hosts only unless `allow_remote`.
///
/// Accepts `localhost`, any address in 127.0.0.0/8 and `[::1]`.
pub fn validate_base_url(url: &str, allow_remote: bool) -> Result<(), InferenceError> {
    let host = url_host(url).ok_or_else(|| InferenceError::InvalidUrl(url.to_string()))?;
    if is_loopback_host(host) || allow_remote {
        Ok(())
    } else {
        Err(InferenceError::NonLocalEndpoint(url.to_string()))
    }
}

fn is_loopback_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Read image files and base64-encode them for the chat API.
pub fn encode_images(paths: &[PathBuf]) -> Result<Vec<String>, InferenceError> {
    paths
        .iter()
        .map(|p| {
            let bytes = std::fs::read(p)?;
            Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ChatOptions {
        ChatOptions {
            temperature: 0.2,
            num_ctx: 16384,
            top_p: 0.9,
        }
    }

    #[test]
    fn request_has_system_then_user() {
        let req = ChatRequest::new("llama3.3:70b", "sys", "usr", opts());
        assert_eq!(req.messages[0].role, ChatRole::System);
        assert_eq!(req.messages[1].role, ChatRole::User);
        assert_eq!(req.image_count(), 0);
        assert_eq!(req.prompt_chars(), 6);
    }

    #[test]
    fn images_attach_to_user_message() {
        let req = ChatRequest::with_images("qwen2.5vl:7b", "s", "u", vec!["aGk=".into()], opts());
        assert!(req.messages[0].images.is_none());
        assert_eq!(req.messages[1].images.as_ref().map(Vec::len), Some(1));
        assert_eq!(req.image_count(), 1);
    }

    #[test]
    fn message_serialization_omits_missing_images() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
        assert!(json.get("images").is_none());
    }

    #[test]
    fn model_names() {
        for ok in [
            "deepseek-r1:70b",
            "llama3.3:70b",
            "qwen2.5vl:7b",
            "library/llama3",
            "nomic-embed-text",
            "a/b/c",
            "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF:Q4_K_M",
            "registry.ollama.ai/library/llama3:8b",
        ] {
            assert!(validate_model_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", ":7b", "a/b/c/d", "hf.co//model", "model name", "../etc", "m;rm -rf"] {
            assert!(validate_model_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn loopback_urls_accepted() {
        for url in [
            "http://localhost:11434",
            "http://localhost",
            "http://127.0.0.1:11434/",
            "http://127.0.1.1:11434",
            "http://127.255.255.254",
            "http://LOCALHOST:11434",
            "http://[::1]:11434",
            "https://localhost:11434",
        ] {
            assert!(validate_base_url(url, false).is_ok(), "{url}");
        }
    }

    #[test]
    fn remote_urls_need_opt_in() {
        for url in ["http://128.0.0.1:11434", "http://127.example.com", "http://0.0.0.0:11434"] {
            assert!(validate_base_url(url, false).is_err(), "{url}");
        }
        let url = "http://192.168.1.20:11434";
        assert!(matches!(
            validate_base_url(url, false),
            Err(InferenceError::NonLocalEndpoint(_))
        ));
        assert!(validate_base_url(url, true).is_ok());
    }

    #[test]
    fn malformed_urls_rejected_even_when_remote_allowed() {
        for url in ["", "localhost:11434", "ftp://localhost", "http://"] {
            assert!(
                matches!(validate_base_url(url, true), Err(InferenceError::InvalidUrl(_))),
                "{url}"
            );
        }
    }

    #[test]
    fn encode_images_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_001.png");
        std::fs::write(&path, b"hi").unwrap();
        assert_eq!(encode_images(&[path]).unwrap(), vec!["aGk=".to_string()]);
        assert!(matches!(
            encode_images(&[dir.path().join("missing.png")]),
            Err(InferenceError::Io(_))
        ));
    }
}
