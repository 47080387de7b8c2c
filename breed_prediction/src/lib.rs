mod labels;
mod model_service;
mod ort_service;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod image_validation;
pub mod predictor;
pub mod preprocessing;
pub mod routes;

pub use app::start_app;
pub use labels::ClassLabelTable;
pub use model_service::{ModelLoadError, ModelService, PredictionError};
pub use ort_service::OrtModelService;
pub use server::{build_router, HttpServer, SharedState};
pub use telemetry::Metrics;
