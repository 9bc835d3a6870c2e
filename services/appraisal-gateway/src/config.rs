use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Dataset location used when `data_path` is not configured, relative to the content root.
pub const DEFAULT_DATA_PATH: &str = "data/apartments.csv";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub service_name: String,
    pub listen_addr: String,
    pub model_service_url: String,
    pub data_path: Option<String>,
    pub content_root: Option<PathBuf>,
    pub model_timeout_secs: Option<u64>,
}

impl GatewayConfig {
    /// Layered load via `appraisal_core::config_builder`; the bare `DATA_PATH` variable overrides `data_path`.
    pub async fn load(service: &str) -> Result<Self> {
        let cfg = appraisal_core::config_builder(service)
            .await?
            .set_default("listen_addr", "0.0.0.0:5163")?
            .set_default("model_service_url", "http://127.0.0.1:8000")?
            .set_override_option("data_path", std::env::var("DATA_PATH").ok())?
            .build()?;
        cfg.try_deserialize().context("invalid gateway configuration")
    }

    pub fn model_timeout(&self) -> Option<Duration> { self.model_timeout_secs.map(Duration::from_secs) }

    pub fn resolved_data_path(&self) -> Result<PathBuf> {
        let root = match &self.content_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("resolving working directory")?,
        };
        Ok(resolve_data_path(self.data_path.as_deref(), &root))
    }
}

/// Blank or missing uses [`DEFAULT_DATA_PATH`]; absolute paths are kept; relative paths
/// are joined onto `root`. The result is normalised lexically.
pub fn resolve_data_path(configured: Option<&str>, root: &Path) -> PathBuf {
    let joined = match configured.map(str::trim).filter(|p| !p.is_empty()) {
        None => root.join(DEFAULT_DATA_PATH),
        Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
        Some(p) => root.join(p),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() { out.push(".."); }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
