mod health;
mod metrics;
mod predict;
mod root;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::{healthcheck, HealthResponse};
pub use predict::{classify, PredictImageError, PredictResponse};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(root::service_info))
        .route("/health", get(health::healthcheck))
        .route("/predict", post(predict::predict_breed))
        .route("/metrics", get(metrics::metrics_handler))
}
