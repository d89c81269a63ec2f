#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the SQL agent.
//!
//! Exposes the agent over SSE at `/api/chat` and each CRUD tool directly at
//! `/api/tools/{action}`, all backed by one shared Postgres connection.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use sql_agent_ai::providers::{LlmProvider, create_provider_from_env};
use sql_agent_database::db;
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// Postgres connection used by every tool call.
    pub db: Arc<dyn Database>,
    /// LLM provider for `/api/chat`, if one is configured.
    pub provider: Option<Arc<dyn LlmProvider>>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/chat", web::post().to(handlers::chat))
            .route("/tools/{action}", web::post().to(handlers::tool)),
    );
}

/// Starts the SQL agent API server.
///
/// Connects to the database, creates the LLM provider from the environment,
/// and starts the Actix-Web HTTP server. The caller is responsible for
/// providing the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection fails.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .expect("Failed to connect to database");

    let provider = match create_provider_from_env() {
        Ok(provider) => Some(Arc::from(provider)),
        Err(e) => {
            log::warn!("AI chat disabled: {e}");
            None
        }
    };

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        provider,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
