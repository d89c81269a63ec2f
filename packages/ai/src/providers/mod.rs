//! LLM provider abstraction and implementations.
//!
//! Supports Anthropic Claude and `OpenAI`-compatible chat APIs via a common
//! trait.

pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::AiError;

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant".
    pub role: String,
    /// Message text. In the agent protocol this is always one JSON object.
    pub content: String,
}

impl Message {
    /// A message from the user side of the conversation.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// A message produced by the model.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends the conversation and returns the model's text reply.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String, AiError>;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` or `AI_BASE_URL` set -> `OpenAI`-compatible
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| detect_provider());

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let api_key = std::env::var("OPENAI_API_KEY").ok();
            let base_url = std::env::var("AI_BASE_URL").ok();
            if api_key.is_none() && base_url.is_none() {
                return Err(AiError::Config {
                    message: "OPENAI_API_KEY environment variable not set".to_string(),
                });
            }
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            Ok(Box::new(openai::OpenAiProvider::new(api_key, model, base_url)))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'anthropic' or 'openai'."),
        }),
    }
}

/// Auto-detects which provider to use based on available credentials.
///
/// Returns a provider name string that matches the arms in
/// [`create_provider_from_env`].
fn detect_provider() -> String {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return "anthropic".to_string();
    }

    if std::env::var("OPENAI_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI (OPENAI_API_KEY found)");
        return "openai".to_string();
    }

    if std::env::var("AI_BASE_URL").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI-compatible server (AI_BASE_URL found)");
        return "openai".to_string();
    }

    log::warn!(
        "No AI credentials detected. Set one of: ANTHROPIC_API_KEY, OPENAI_API_KEY, \
         or AI_BASE_URL. You can also set AI_PROVIDER explicitly."
    );

    // Fall back to anthropic; it will produce a clear error about the missing key.
    "anthropic".to_string()
}
