//! Core shared utilities for appraisal services.

use anyhow::Result;
use axum::{http::{header, StatusCode}, response::{IntoResponse, Response}, routing::get, Json, Router};
use config::{builder::DefaultState, ConfigBuilder};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

/// Prefix shared by every environment variable the services read.
pub const ENV_PREFIX: &str = "APPRAISAL";

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn mark_not_live() { NODE_LIVENESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Installs the global subscriber. `RUST_LOG` wins, then `APPRAISAL_LOG_LEVEL`, then `info`.
/// Safe to call more than once.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = std::env::var(format!("{ENV_PREFIX}_LOG_LEVEL")).unwrap_or_else(|_| "info".into());
            EnvFilter::new(level)
        });
        let registry = tracing_subscriber::registry().with(env_filter);
        if env_flag(&format!("{ENV_PREFIX}_JSON_LOG")) {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(target: "appraisal_core", service, "tracing initialized");
    Ok(())
}

/// Layered configuration: defaults, optional file, optional remote YAML, then `APPRAISAL_*` env.
/// Services add their own defaults and overrides before calling `build()`.
pub async fn config_builder(service: &str) -> Result<ConfigBuilder<DefaultState>> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?;

    if let Ok(file) = std::env::var(format!("{ENV_PREFIX}_CONFIG_FILE")) {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    if let Ok(http_url) = std::env::var(format!("{ENV_PREFIX}_CONFIG_HTTP")) {
        match fetch_remote_config(&http_url).await {
            Ok(text) => builder = builder.add_source(config::File::from_str(&text, config::FileFormat::Yaml)),
            Err(e) => warn!(error = %e, url = %http_url, "remote config unavailable, skipping"),
        }
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}

async fn fetch_remote_config(url: &str) -> Result<String> {
    let resp = reqwest::get(url).await?.error_for_status()?;
    Ok(resp.text().await?)
}

/// Liveness, readiness, status and Prometheus exposition routes.
pub fn health_routes(service: &str) -> Router {
    let name = service.to_string();
    Router::new()
        .route("/live", get(|| async { Json(serde_json::json!({"live": NODE_LIVENESS.load(Ordering::SeqCst)})) }))
        .route("/ready", get(|| async { Json(serde_json::json!({"ready": NODE_READINESS.load(Ordering::SeqCst)})) }))
        .route("/status", get(move || {
            let name = name.clone();
            async move {
                Json(serde_json::json!({
                    "service": name,
                    "live": NODE_LIVENESS.load(Ordering::SeqCst),
                    "ready": NODE_READINESS.load(Ordering::SeqCst),
                }))
            }
        }))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> Response {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}
