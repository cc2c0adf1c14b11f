// ============================================================
// Layer 1 — Inference Service (HTTP)
// ============================================================
// Serves predictions from the latest persisted models over HTTP.
//
//   GET  /                  banner
//   GET  /health            loaded model versions
//   POST /predict/feels     comfort label + class probabilities
//   POST /predict/hr        heart rate
//   POST /predict/clothing  upr_clo / lwr_clo
//
// The ServiceContext is loaded once, before the listener binds,
// and shared read-only through an Arc; handlers never mutate it.
//
// Reference: axum documentation (Router, State extractor)

pub mod context;
pub mod error;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

use context::ServiceContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    pub models_dir: String,
    /// host:port
    pub bind:       String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            bind:       "0.0.0.0:8080".to_string(),
        }
    }
}

pub fn router(ctx: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict/feels", post(handlers::predict_feels))
        .route("/predict/hr", post(handlers::predict_hr))
        .route("/predict/clothing", post(handlers::predict_clothing))
        .with_state(ctx)
}

/// Load the models, then serve until Ctrl+C.
pub fn serve(config: ServeConfig) -> Result<()> {
    let ctx = Arc::new(ServiceContext::load(Path::new(&config.models_dir))?);

    let runtime = tokio::runtime::Runtime::new().context("Cannot start the tokio runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&config.bind)
            .await
            .with_context(|| format!("Failed to bind {}", config.bind))?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router(ctx))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("Server stopped");
        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {e}");
        // keep serving; the process can still be killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
