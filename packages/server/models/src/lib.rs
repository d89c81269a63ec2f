#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! API request and response types for the SQL agent server.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's request in natural language.
    pub message: String,
}

/// Error body returned by handlers that fail outside the tool envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_reads_message() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"list my tables"}"#).unwrap();
        assert_eq!(request.message, "list my tables");
    }

    #[test]
    fn health_serializes_camel_case() {
        let json = serde_json::to_value(ApiHealth {
            healthy: true,
            version: "0.1.0".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "healthy": true, "version": "0.1.0" }));
    }
}
