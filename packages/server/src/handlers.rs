//! HTTP handler functions for the SQL agent API.

use actix_web::{HttpResponse, web};
use sql_agent_ai::AgentEvent;
use sql_agent_ai::agent::run_agent;
use sql_agent_database::execute_action;
use sql_agent_server_models::{ApiError, ApiHealth, ChatRequest};
use tokio::sync::mpsc;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/chat`
///
/// Runs the agent for one user message and streams its [`AgentEvent`]s as
/// server-sent events. The first event carries a fresh session id.
pub async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HttpResponse {
    let message = body.into_inner().message;
    if message.trim().is_empty() {
        return HttpResponse::BadRequest().json(ApiError {
            error: "message must not be empty".to_string(),
        });
    }

    let Some(provider) = state.provider.clone() else {
        return HttpResponse::ServiceUnavailable().json(ApiError {
            error: "No AI provider configured".to_string(),
        });
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    log::info!("Starting chat session {session_id}");

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(32);
    let _ = tx.send(AgentEvent::Session { id: session_id }).await;

    let db = state.db.clone();
    tokio::spawn(async move {
        let error_tx = tx.clone();
        if let Err(e) = run_agent(provider.as_ref(), db.as_ref(), &message, tx).await {
            log::error!("Agent failed: {e}");
            let _ = error_tx
                .send(AgentEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, actix_web::Error>(sse_frame(&event));
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

/// `POST /api/tools/{action}`
///
/// Runs one tool action with the request body as its input and returns the
/// tool's envelope. Tool failures are reported in the envelope, not through
/// the HTTP status.
pub async fn tool(
    state: web::Data<AppState>,
    action: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let response = execute_action(state.db.as_ref(), &action, &body).await;
    HttpResponse::Ok().json(response)
}

/// Encodes one event as an SSE `data:` frame.
fn sse_frame(event: &AgentEvent) -> web::Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        log::error!("Failed to serialize agent event: {e}");
        r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
    });
    web::Bytes::from(format!("data: {json}\n\n"))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(App::new().route("/health", web::get().to(health))).await;
        let request = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[::core::prelude::v1::test]
    fn events_are_framed_as_sse() {
        let frame = sse_frame(&AgentEvent::Answer {
            text: "done".to_string(),
        });
        assert_eq!(
            frame,
            web::Bytes::from_static(b"data: {\"type\":\"answer\",\"text\":\"done\"}\n\n")
        );
    }
}
