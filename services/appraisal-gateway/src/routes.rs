//! HTTP surface: `POST /predict` and `POST /apartments`, also under `/api/AI`.

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, routing::post, Json, Router};
use std::sync::Arc;

use crate::dataset::ApartmentRecord;
use crate::gateway::PredictionGateway;
use crate::ingest::{IngestError, IngestOrchestrator};
use crate::model_client::{PredictionQuery, ServiceError};

pub const SAVED_MESSAGE: &str = "Apartment saved and retraining triggered";
pub const PERSIST_FAILED_MESSAGE: &str = "Failed to save apartment to dataset";

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PredictionGateway>,
    pub ingest: Arc<IngestOrchestrator>,
}

pub fn router(state: AppState, service: &str) -> Router {
    let api = Router::new()
        .route("/predict", post(predict))
        .route("/apartments", post(add_apartment));
    Router::new()
        .merge(api.clone())
        .nest("/api/AI", api)
        .with_state(state)
        .merge(appraisal_core::health_routes(service))
}

fn upstream_status(e: &ServiceError) -> StatusCode {
    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
}

async fn predict(State(state): State<AppState>, Json(query): Json<PredictionQuery>) -> Response {
    match state.gateway.predict(&query).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => (upstream_status(&e), e.detail()).into_response(),
    }
}

async fn add_apartment(State(state): State<AppState>, Json(record): Json<ApartmentRecord>) -> Response {
    match state.ingest.ingest(&record).await {
        Ok(_) => Json(serde_json::json!({ "message": SAVED_MESSAGE })).into_response(),
        // details were logged by the orchestrator; keep filesystem paths out of the response
        Err(IngestError::PersistFailed(_)) => (StatusCode::INTERNAL_SERVER_ERROR, PERSIST_FAILED_MESSAGE).into_response(),
        Err(IngestError::RetrainFailed(e)) => {
            (upstream_status(&e), format!("Apartment saved, but retraining failed: {}", e.detail())).into_response()
        }
    }
}
