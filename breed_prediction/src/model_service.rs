use crate::preprocessing::InputTensor;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("Failed to create ONNX session: {0}")]
    Session(#[from] ort::Error),
    #[error("Failed to load labels: {0}")]
    Labels(#[from] io::Error),
    #[error("Label table has {labels} entries but the model outputs {outputs} classes")]
    LabelMismatch { labels: usize, outputs: usize },
    #[error("Model failed a test inference: {0}")]
    Warmup(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum PredictionError {
    #[error("Model service not available. Please check service health.")]
    ModelNotLoaded,
    #[error("Error during prediction: {0}")]
    PredictionFailed(String),
}

/// One forward pass over a single-image batch, returning the class
/// probabilities.
pub trait ModelService: Send + Sync + 'static {
    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, PredictionError>;
}
