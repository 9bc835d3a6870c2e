//! Client for the external model service (`POST /predict`, `POST /retrain`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::metrics::MODEL_REQUEST_SECONDS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionQuery {
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub sqm: f64,
    pub city: String,
}

/// The price is kept as the upstream JSON number so it is relayed exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(alias = "priceAZN")]
    pub price: serde_json::Number,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Non-success response; status and body are kept verbatim.
    #[error("model service responded {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("model service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("model service returned an unreadable response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Status to relay to our own caller. Local failures map to 502.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Upstream { status, .. } => *status,
            ServiceError::Transport(_) | ServiceError::Decode(_) => 502,
        }
    }

    /// Caller-facing detail: the raw upstream body, or the local failure text.
    pub fn detail(&self) -> String {
        match self {
            ServiceError::Upstream { body, .. } => body.clone(),
            ServiceError::Transport(e) => format!("model service unreachable: {e}"),
            ServiceError::Decode(msg) => msg.clone(),
        }
    }
}

#[async_trait]
pub trait ModelService: Send + Sync {
    async fn predict(&self, query: &PredictionQuery) -> Result<PredictionResult, ServiceError>;
    /// Asks the service to retrain from the current dataset. Only acceptance is awaited.
    async fn trigger_retrain(&self) -> Result<(), ServiceError>;
}

/// HTTP implementation. No retries; one transport failure is returned as is.
#[derive(Clone, Debug)]
pub struct HttpModelClient {
    http: Client,
    predict_url: Url,
    retrain_url: Url,
}

impl HttpModelClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') { base.push('/'); }
        let base = Url::parse(&base).with_context(|| format!("invalid model service url `{base_url}`"))?;
        let mut builder = Client::builder();
        if let Some(t) = timeout { builder = builder.timeout(t); }
        Ok(Self {
            http: builder.build().context("building http client")?,
            predict_url: base.join("predict")?,
            retrain_url: base.join("retrain")?,
        })
    }

    pub fn predict_url(&self) -> &Url { &self.predict_url }
}

async fn upstream_error(resp: reqwest::Response) -> ServiceError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ServiceError::Upstream { status, body }
}

#[async_trait]
impl ModelService for HttpModelClient {
    async fn predict(&self, query: &PredictionQuery) -> Result<PredictionResult, ServiceError> {
        let _timer = MODEL_REQUEST_SECONDS.with_label_values(&["predict"]).start_timer();
        let resp = self.http.post(self.predict_url.clone()).json(query).send().await.map_err(ServiceError::Transport)?;
        if !resp.status().is_success() { return Err(upstream_error(resp).await); }
        resp.json::<PredictionResult>().await.map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn trigger_retrain(&self) -> Result<(), ServiceError> {
        let started = Instant::now();
        let resp = self.http.post(self.retrain_url.clone()).send().await.map_err(ServiceError::Transport);
        MODEL_REQUEST_SECONDS.with_label_values(&["retrain"]).observe(started.elapsed().as_secs_f64());
        let resp = resp?;
        if !resp.status().is_success() { return Err(upstream_error(resp).await); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
        format!("http://{addr}")
    }

    fn query() -> PredictionQuery {
        PredictionQuery { bedrooms: 2.0, bathrooms: 1.0, sqm: 80.0, city: "Baku".into() }
    }

    #[tokio::test]
    async fn predict_sends_features_and_parses_price() {
        let app = Router::new().route("/predict", post(|Json(q): Json<PredictionQuery>| async move {
            assert_eq!(q.city, "Baku");
            assert_eq!(q.sqm, 80.0);
            Json(serde_json::json!({"price": 150000}))
        }));
        let client = HttpModelClient::new(&serve(app).await, None).unwrap();
        assert_eq!(client.predict(&query()).await.unwrap(), PredictionResult { price: 150000u64.into() });
    }

    #[tokio::test]
    async fn predict_accepts_legacy_price_field() {
        let app = Router::new().route("/predict", post(|| async { Json(serde_json::json!({"priceAZN": 99.5})) }));
        let client = HttpModelClient::new(&serve(app).await, None).unwrap();
        assert_eq!(client.predict(&query()).await.unwrap().price.as_f64(), Some(99.5));
    }

    #[tokio::test]
    async fn predict_keeps_upstream_status_and_body() {
        let app = Router::new().route("/predict", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model unavailable") }));
        let client = HttpModelClient::new(&serve(app).await, None).unwrap();
        match client.predict(&query()).await {
            Err(ServiceError::Upstream { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model unavailable");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn predict_with_garbage_body_is_decode_error() {
        let app = Router::new().route("/predict", post(|| async { "not json" }));
        let client = HttpModelClient::new(&serve(app).await, None).unwrap();
        let err = client.predict(&query()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn retrain_success_and_failure() {
        let ok = Router::new().route("/retrain", post(|| async { Json(serde_json::json!({"message": "Model retrained successfully"})) }));
        HttpModelClient::new(&serve(ok).await, None).unwrap().trigger_retrain().await.unwrap();

        let failing = Router::new().route("/retrain", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "dataset empty") }));
        let err = HttpModelClient::new(&serve(failing).await, None).unwrap().trigger_retrain().await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.detail(), "dataset empty");
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = HttpModelClient::new(&format!("http://{addr}"), Some(Duration::from_secs(2))).unwrap();
        let err = client.trigger_retrain().await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn base_path_is_preserved() {
        let client = HttpModelClient::new("http://models.local/v1", None).unwrap();
        assert_eq!(client.predict_url().as_str(), "http://models.local/v1/predict");
        assert!(HttpModelClient::new("not a url", None).is_err());
    }
}
