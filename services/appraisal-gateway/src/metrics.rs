//! Prometheus collectors for the gateway, registered in the default registry
//! so the core `/metrics` route exposes them.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec, IntCounter, IntCounterVec};

pub static INGEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("appraisal_ingest_total", "Apartment submissions by outcome", &["outcome"])
        .expect("register appraisal_ingest_total")
});

pub static PREDICT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("appraisal_predict_total", "Prediction requests by outcome", &["outcome"])
        .expect("register appraisal_predict_total")
});

pub static DATASET_ROWS_APPENDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("appraisal_dataset_rows_appended_total", "Rows appended to the training dataset")
        .expect("register appraisal_dataset_rows_appended_total")
});

pub static MODEL_REQUEST_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!("appraisal_model_request_seconds", "Latency of model service calls", &["op"])
        .expect("register appraisal_model_request_seconds")
});
