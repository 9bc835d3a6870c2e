//! Apartment price gateway: relays predictions to the model service and ingests
//! new labeled apartments into the training dataset before triggering a retrain.

use anyhow::{Context, Result};
use appraisal_core::{clear_ready, init_tracing, mark_ready};
use axum::Router;
use std::sync::Arc;
use tracing::{info, warn};

pub mod config;
pub mod dataset;
pub mod gateway;
pub mod ingest;
pub mod metrics;
pub mod model_client;
pub mod routes;

use config::GatewayConfig;
use dataset::DatasetStore;
use gateway::PredictionGateway;
use ingest::IngestOrchestrator;
use model_client::{HttpModelClient, ModelService};
use routes::AppState;

pub const SERVICE: &str = "appraisal-gateway";

/// Wires the components from configuration and returns the full router.
pub fn build_app(cfg: &GatewayConfig) -> Result<Router> {
    let data_path = cfg.resolved_data_path()?;
    let model: Arc<dyn ModelService> = Arc::new(HttpModelClient::new(&cfg.model_service_url, cfg.model_timeout())?);
    info!(data_path = %data_path.display(), model_service = %cfg.model_service_url, "gateway components wired");
    let state = AppState {
        gateway: Arc::new(PredictionGateway::new(Arc::clone(&model))),
        ingest: Arc::new(IngestOrchestrator::new(DatasetStore::new(data_path), model)),
    };
    Ok(routes::router(state, &cfg.service_name))
}

pub async fn run() -> Result<()> {
    init_tracing(SERVICE)?;
    let cfg = GatewayConfig::load(SERVICE).await?;
    info!(?cfg, "config loaded");

    let app = build_app(&cfg)?;
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;
    info!(addr = %listener.local_addr()?, "gateway listening");
    mark_ready();

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("shutdown");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed, shutting down");
    }
    clear_ready();
}
