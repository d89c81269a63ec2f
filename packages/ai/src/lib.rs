#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM agent for the SQL CRUD tools.
//!
//! Supports Anthropic Claude, `OpenAI`, and any `OpenAI`-compatible
//! local/self-hosted server (Ollama, vLLM, llama.cpp, LM Studio) via the
//! `AI_BASE_URL` environment variable. The model talks a small JSON
//! protocol: it plans, asks for tool actions, receives observations, and
//! finally produces an output for the user.

pub mod agent;
pub mod providers;

use sql_agent_database_models::ToolResponse;
use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Agent loop exceeded maximum iterations.
    #[error("Agent loop exceeded maximum of {max_iterations} iterations")]
    MaxIterations {
        /// The configured maximum.
        max_iterations: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// Events emitted by the agent during execution.
///
/// These are streamed to the frontend via SSE.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    /// The session ID for this chat.
    ///
    /// Sent first so the client can correlate the stream in logs.
    Session {
        /// The unique session identifier.
        id: String,
    },
    /// The model stated its plan for the next step.
    Plan {
        /// Plan text as written by the model.
        text: String,
    },
    /// The model requested a tool action.
    Action {
        /// Action name (e.g. `createTable`).
        function: String,
        /// Action input (JSON).
        input: serde_json::Value,
    },
    /// A tool action finished and its envelope was fed back to the model.
    Observation {
        /// Action name.
        function: String,
        /// The tool's response envelope.
        response: ToolResponse,
    },
    /// Agent has produced a final answer.
    Answer {
        /// The answer text.
        text: String,
    },
    /// An error occurred.
    Error {
        /// Error message.
        message: String,
    },
}
