//! Chat-completion (AI text generation) provider payloads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::{UpstreamRequest, UpstreamResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    pub fn to_upstream(
        &self,
        url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> serde_json::Result<UpstreamRequest> {
        Ok(UpstreamRequest::post(url, timeout)
            .bearer(api_key)
            .json(serde_json::to_value(self)?))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Content of the first choice, if present.
pub fn parse_completion(response: &UpstreamResponse) -> Option<String> {
    response
        .json::<ChatCompletionResponse>()
        .ok()?
        .choices
        .into_iter()
        .next()?
        .message?
        .content
}
