use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::metrics::PREDICT_TOTAL;
use crate::model_client::{ModelService, PredictionQuery, PredictionResult, ServiceError};

/// Pass-through to the model service. Upstream failures are returned untouched.
pub struct PredictionGateway {
    model: Arc<dyn ModelService>,
}

impl PredictionGateway {
    pub fn new(model: Arc<dyn ModelService>) -> Self { Self { model } }

    #[instrument(skip_all, fields(city = %query.city))]
    pub async fn predict(&self, query: &PredictionQuery) -> Result<PredictionResult, ServiceError> {
        match self.model.predict(query).await {
            Ok(result) => {
                PREDICT_TOTAL.with_label_values(&["ok"]).inc();
                debug!(price = %result.price, "prediction relayed");
                Ok(result)
            }
            Err(e) => {
                let outcome = match e {
                    ServiceError::Upstream { .. } => "upstream_error",
                    ServiceError::Transport(_) => "transport_error",
                    ServiceError::Decode(_) => "decode_error",
                };
                PREDICT_TOTAL.with_label_values(&[outcome]).inc();
                warn!(status = e.status_code(), error = %e, "prediction failed");
                Err(e)
            }
        }
    }
}
