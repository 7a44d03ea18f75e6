use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod db;
mod domain;
mod http;
mod metrics;
mod store;
mod utils;

use config::AppConfig;
use store::{InMemoryStore, MarketStore, PgStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,marketplace_orders=debug"))
        )
        .init();

    tracing::info!("🚀 Starting marketplace order service");

    // === 1. Load configuration ===
    let config = AppConfig::from_env()?;
    tracing::info!(cancellation = ?config.cancellation, "Configuration loaded");

    // === 2. Choose the store ===
    let store: Arc<dyn MarketStore> = match &config.database {
        Some(settings) => {
            let pool = db::connect(settings).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(InMemoryStore::new())
        }
    };

    // === 3. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 4. Serve the API, /metrics and /health on one listener ===
    let state = web::Data::new(http::AppState::new(store, metrics.clone(), config.cancellation));
    let metrics_data = web::Data::from(metrics);

    let bind = (config.http.host.clone(), config.http.port);
    tracing::info!("🌐 Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(metrics_data.clone())
            .configure(http::routes)
            .configure(metrics::routes)
    })
    .bind(bind)?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
