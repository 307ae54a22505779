use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a completion couldn't be produced.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Completion service replied with status {0}")]
    Rejected(reqwest::StatusCode),
    #[error("Completion service reply had no content")]
    Empty,
}

/// A hosted language model that can answer a message under a system prompt.
#[rocket::async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, message: &str) -> Result<String, BackendError>;
}

/// OpenAI-compatible chat completions.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub const TEMPERATURE: f32 = 0.7;

    /// Create a backend posting to `endpoint`, giving up on requests after `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn request<'a>(&'a self, system_prompt: &'a str, message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: Self::TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
        }
    }
}

#[rocket::async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, system_prompt: &str, message: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(system_prompt, message))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(response.status()));
        }
        response.json::<ChatResponse>().await?.into_reply()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// The first choice's text, if there is any.
    fn into_reply(self) -> Result<String, BackendError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(BackendError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn request_has_system_and_user_messages() {
        let backend = OpenAiBackend::new(
            "http://localhost/v1/chat/completions",
            "key",
            "test-model",
            Duration::from_secs(1),
        )
        .unwrap();
        let body = serde_json::to_value(backend.request("be nice", "hello")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "test-model",
                "temperature": 0.7_f32,
                "messages": [
                    { "role": "system", "content": "be nice" },
                    { "role": "user", "content": "hello" },
                ],
            })
        );
    }

    #[test]
    fn reply_is_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "first" } },
                { "message": { "role": "assistant", "content": "second" } },
            ],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 },
        }))
        .unwrap();
        assert_eq!(response.into_reply().unwrap(), "first");

        let empty: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(empty.into_reply(), Err(BackendError::Empty)));

        let blank: ChatResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": "  " } }] }))
                .unwrap();
        assert!(matches!(blank.into_reply(), Err(BackendError::Empty)));
    }
}
