//! Persist-then-retrain orchestration for new labeled apartments.
//!
//! The two steps are never reordered and step one is never rolled back: a stored
//! record with a stale model is preferred over a lost record.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::dataset::{ApartmentRecord, DatasetError, DatasetStore};
use crate::metrics::INGEST_TOTAL;
use crate::model_client::{ModelService, ServiceError};

/// Record persisted and retraining accepted by the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Nothing was written; retraining was not attempted.
    #[error("failed to persist apartment: {0}")]
    PersistFailed(#[source] DatasetError),
    /// The record is stored but the model has not been retrained on it.
    #[error("apartment persisted, retrain failed: {0}")]
    RetrainFailed(#[source] ServiceError),
}

impl IngestError {
    pub fn is_persisted(&self) -> bool { matches!(self, IngestError::RetrainFailed(_)) }
}

pub struct IngestOrchestrator {
    store: DatasetStore,
    model: Arc<dyn ModelService>,
}

impl IngestOrchestrator {
    pub fn new(store: DatasetStore, model: Arc<dyn ModelService>) -> Self { Self { store, model } }

    pub fn store(&self) -> &DatasetStore { &self.store }

    #[instrument(skip_all, fields(city = %record.city))]
    pub async fn ingest(&self, record: &ApartmentRecord) -> Result<Ingested, IngestError> {
        if let Err(e) = self.store.append(record).await {
            error!(error = %e, path = %self.store.path().display(), "failed to append apartment to dataset");
            INGEST_TOTAL.with_label_values(&["persist_failed"]).inc();
            return Err(IngestError::PersistFailed(e));
        }

        match self.model.trigger_retrain().await {
            Ok(()) => {
                INGEST_TOTAL.with_label_values(&["retrained"]).inc();
                info!("apartment saved and retraining triggered");
                Ok(Ingested)
            }
            Err(e) => {
                INGEST_TOTAL.with_label_values(&["retrain_failed"]).inc();
                warn!(status = e.status_code(), error = %e, "apartment saved but retrain trigger failed");
                Err(IngestError::RetrainFailed(e))
            }
        }
    }
}
