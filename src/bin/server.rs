//! Timecap REST API Server
//!
//! Run with: cargo run --release --features server --bin timecap-server
//!
//! Environment:
//!   TIMECAP_DB    - LMDB directory (default ./timecap-data)
//!   TIMECAP_ADDR  - bind address (default 127.0.0.1:8420)
//!   RUST_LOG      - tracing filter (default info)

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_path = std::env::var("TIMECAP_DB").unwrap_or_else(|_| "./timecap-data".to_string());
    let addr = std::env::var("TIMECAP_ADDR").unwrap_or_else(|_| "127.0.0.1:8420".to_string());

    timecap::init(&db_path)?;
    tracing::info!(db = %db_path, "database initialized");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, timecap::server::router()).await?;
    Ok(())
}
