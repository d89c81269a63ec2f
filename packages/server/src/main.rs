#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! SQL agent API server binary.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    sql_agent_server::run_server().await
}
