//! Chat completion upstream

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, BackendError, Unconfigured};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run one completion and return the assistant message
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatMessage, BackendError>;
}

/// DeepSeek's OpenAI-compatible chat completion API
pub struct DeepSeekChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl DeepSeekChat {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ChatCompletion for DeepSeekChat {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatMessage, BackendError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model,
                messages,
                stream: false,
            })
            .send()
            .await?;

        let completion: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| BackendError::Decode("completion without choices".into()))
    }
}

#[async_trait]
impl ChatCompletion for Unconfigured {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
    ) -> Result<ChatMessage, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }
}
