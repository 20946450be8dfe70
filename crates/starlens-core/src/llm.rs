//! Chat-completions transport shared by the identification and QA clients.
//!
//! Speaks the OpenAI-compatible `POST /chat/completions` protocol: bearer
//! auth, JSON body, answer in `choices[0].message.content`. Every call is a
//! single attempt bounded by the endpoint timeout.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Where and as whom to call a model. Immutable once built.
#[derive(Clone)]
pub struct ModelEndpoint {
    pub url: String,
    /// Bearer credential. When absent no `Authorization` header is sent and
    /// the endpoint's own auth failure comes back like any other error.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl ModelEndpoint {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ModelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEndpoint")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".into(),
            content,
        }
    }
}

/// Message body: plain text, or a list of typed parts for multimodal input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// HTTP client bound to one [`ModelEndpoint`].
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ChatClient {
    endpoint: ModelEndpoint,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(endpoint.timeout).build()?;
        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &ModelEndpoint {
        &self.endpoint
    }

    /// Send one chat request and return the assistant's message text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut builder = self.http.post(&self.endpoint.url).json(request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_content(&body)
    }
}

fn parse_content(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("no choices in response".into()))?
        .message
        .content
        .ok_or_else(|| LlmError::Malformed("assistant message has no content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_content_ok() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hi there"}}]}"#;
        assert_eq!(parse_content(body).unwrap(), "hi there");
    }

    #[test]
    fn test_parse_content_malformed() {
        for body in [
            "",
            "not json",
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
            r#"{"error":{"message":"bad key"}}"#,
        ] {
            assert!(
                matches!(parse_content(body), Err(LlmError::Malformed(_))),
                "body {body:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_multimodal_request_wire_shape() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user(MessageContent::Parts(vec![
                ContentPart::Text { text: "prompt".into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: "data:image/jpeg;base64,AAAA".into() },
                },
            ]))],
            temperature: 0.25,
            max_tokens: 1024,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "m",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "prompt"},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
                    ]
                }],
                "temperature": 0.25,
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn test_text_request_wire_shape() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user(MessageContent::Text("q".into()))],
            temperature: 0.5,
            max_tokens: 512,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "q"}));
    }

    #[test]
    fn test_endpoint_debug_redacts_key() {
        let endpoint = ModelEndpoint::new("http://x", "m", Some("sk-secret".into()));
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
