//! `OpenAI` (and `OpenAI`-compatible) chat completions provider.

use serde::{Deserialize, Serialize};

use super::{LlmProvider, Message};
use crate::AiError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI` API provider.
///
/// With a custom base URL this also talks to self-hosted servers exposing
/// the chat completions endpoint, which often need no API key.
pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new `OpenAI` provider.
    ///
    /// `base_url` defaults to the public `OpenAI` endpoint.
    #[must_use]
    pub fn new(api_key: Option<String>, model: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .as_deref()
            .map_or(DEFAULT_BASE_URL, |url| url.trim_end_matches('/'))
            .to_string();
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String, AiError> {
        let mut api_messages = vec![OpenAiMessage {
            role: "system",
            content: system_prompt,
        }];
        api_messages.extend(messages.iter().map(|m| OpenAiMessage {
            role: &m.role,
            content: &m.content,
        }));

        let request = OpenAiRequest {
            model: &self.model,
            messages: api_messages,
            max_tokens: 4096,
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let resp = builder.json(&request).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: OpenAiError = serde_json::from_str(&body).unwrap_or_else(|_| OpenAiError {
                error: OpenAiErrorDetail {
                    message: format!("HTTP {status}: {body}"),
                },
            });
            return Err(AiError::Provider {
                message: err.error.message,
            });
        }

        let response: OpenAiResponse = serde_json::from_str(&body)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Provider {
                message: "No choices in OpenAI response".to_string(),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
