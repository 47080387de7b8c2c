use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status")]
pub enum HealthResponse {
    #[serde(rename = "success")]
    Success {
        message: String,
        model_loaded: bool,
        model_path: String,
        num_classes: usize,
    },
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    state.metrics.record_request("/health");

    let predictor = &state.predictor;
    let description = predictor.describe();
    let message = match predictor.load_failure() {
        None => "Service is running".to_string(),
        Some(reason) => format!("Service is running, model not loaded: {}", reason),
    };

    Json(HealthResponse::Success {
        message,
        model_loaded: predictor.is_ready(),
        model_path: description.model_path,
        num_classes: description.num_classes,
    })
}
