//! Completion provider seam
//!
//! [`CompletionProvider`] is the only way the session reaches the network.
//! [`HttpCompletionProvider`] speaks the OpenAI-compatible
//! `chat/completions` protocol that OpenRouter serves; tests substitute a
//! scripted implementation.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::config::Config;
use crate::core::message::ROLE_ASSISTANT;

/// Failure of a single completion call. Every variant is recovered the same
/// way by the session; the distinction only matters for diagnostics.
#[derive(Debug)]
pub enum ProviderError {
    /// The request never produced an HTTP response.
    Transport(reqwest::Error),
    /// The provider answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The body was not the expected completion shape.
    MalformedResponse(String),
    /// The task running the call panicked or was aborted.
    Interrupted(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(err) => write!(f, "request failed: {err}"),
            ProviderError::Status { status, body } => match extract_error_summary(body) {
                Some(summary) => write!(f, "API request failed with status {status}: {summary}"),
                None if body.trim().is_empty() => {
                    write!(f, "API request failed with status {status}")
                }
                None => write!(f, "API request failed with status {status}: {}", body.trim()),
            },
            ProviderError::MalformedResponse(detail) => {
                write!(f, "malformed completion response: {detail}")
            }
            ProviderError::Interrupted(detail) => write!(f, "completion task interrupted: {detail}"),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProviderError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Pull a one-line summary out of a JSON error body such as
/// `{"error":{"message":"..."}}`.
pub(crate) fn extract_error_summary(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue one completion request and return the assistant's reply.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub referer: String,
    pub title: String,
    pub timeout: Option<Duration>,
}

impl ProviderSettings {
    pub fn from_config(config: &Config, api_key: String) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            api_key,
            referer: config.referer().to_string(),
            title: config.title().to_string(),
            timeout: config.request_timeout(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

pub struct HttpCompletionProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl HttpCompletionProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            settings,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, ProviderError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.settings.completions_url())
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.title)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(ProviderError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::Transport)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Completion response received");

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }
}

/// Take the first choice of a completion body as the assistant's reply.
pub(crate) fn parse_completion(body: &str) -> Result<ChatMessage, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::MalformedResponse(err.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".to_string()))?;

    let role = choice
        .message
        .role
        .ok_or_else(|| ProviderError::MalformedResponse("choice has no role".to_string()))?;
    if role != ROLE_ASSISTANT {
        return Err(ProviderError::MalformedResponse(format!(
            "unexpected reply role: {role}"
        )));
    }

    let content = choice
        .message
        .content
        .ok_or_else(|| ProviderError::MalformedResponse("choice has no content".to_string()))?;

    Ok(ChatMessage::new(role, content))
}
