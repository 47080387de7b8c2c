use crate::{
    config::{Config, Validatable},
    labels::ClassLabelTable,
    model_service::{ModelLoadError, ModelService, PredictionError},
    ort_service::OrtModelService,
    preprocessing::InputTensor,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_breed: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    pub model_path: String,
    pub num_classes: usize,
}

enum ModelState {
    Loaded(Box<dyn ModelService>),
    FailedToLoad(String),
}

/// The loaded model and its label table. Built once at startup and only read
/// afterwards; a failed load is permanent for the life of the process.
pub struct Predictor {
    state: ModelState,
    labels: ClassLabelTable,
    model_path: PathBuf,
}

impl Predictor {
    pub fn new(
        model_service: impl ModelService,
        labels: ClassLabelTable,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state: ModelState::Loaded(Box::new(model_service)),
            labels,
            model_path: model_path.into(),
        }
    }

    pub fn failed(
        reason: impl Into<String>,
        labels: ClassLabelTable,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state: ModelState::FailedToLoad(reason.into()),
            labels,
            model_path: model_path.into(),
        }
    }

    /// Loads the ONNX sessions and the label table. Any failure is logged and
    /// yields a predictor that reports itself as not ready.
    pub fn from_config(config: &Config) -> Self {
        let model_path = config.model.get_path();
        match load_model(config) {
            Ok((model_service, labels)) => {
                tracing::info!(
                    "Model loaded from {:?} with {} classes",
                    model_path,
                    labels.len()
                );
                Self::new(model_service, labels, model_path)
            }
            Err(e) => {
                tracing::error!("Failed to load model on startup: {}", e);
                Self::failed(e.to_string(), ClassLabelTable::embedded(), model_path)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    pub fn load_failure(&self) -> Option<&str> {
        match &self.state {
            ModelState::Loaded(_) => None,
            ModelState::FailedToLoad(reason) => Some(reason.as_str()),
        }
    }

    pub fn describe(&self) -> ModelDescription {
        ModelDescription {
            model_path: self.model_path.display().to_string(),
            num_classes: self.labels.len(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn predict(&self, input: &InputTensor) -> Result<PredictionResult, PredictionError> {
        let model_service = match &self.state {
            ModelState::Loaded(model_service) => model_service,
            ModelState::FailedToLoad(_) => return Err(PredictionError::ModelNotLoaded),
        };

        let probabilities = model_service.run(input)?;
        if probabilities.len() != self.labels.len() {
            return Err(PredictionError::PredictionFailed(format!(
                "expected {} class probabilities, got {}",
                self.labels.len(),
                probabilities.len()
            )));
        }

        let (class_id, probability) = argmax(&probabilities).ok_or_else(|| {
            PredictionError::PredictionFailed("model output contains no numeric values".into())
        })?;
        if !probability.is_finite() {
            return Err(PredictionError::PredictionFailed(format!(
                "non-finite probability {} for class {}",
                probability, class_id
            )));
        }

        let predicted_breed = self.labels.get(class_id).ok_or_else(|| {
            PredictionError::PredictionFailed(format!("no label for class {}", class_id))
        })?;

        tracing::debug!(
            "Prediction: class_id={}, breed={}, confidence={:.4}",
            class_id,
            predicted_breed,
            probability
        );

        Ok(PredictionResult {
            predicted_breed: predicted_breed.to_string(),
            confidence: probability.clamp(0.0, 1.0),
        })
    }
}

fn load_model(config: &Config) -> Result<(OrtModelService, ClassLabelTable), ModelLoadError> {
    let labels = match &config.labels {
        Some(labels_config) => ClassLabelTable::from_file(&labels_config.get_path())?,
        None => ClassLabelTable::embedded(),
    };
    let model_service = OrtModelService::new(&config.model)?;
    check_output_classes(&model_service, &labels)?;

    Ok((model_service, labels))
}

/// Runs one forward pass on a blank image and compares the number of class
/// probabilities with the label table.
fn check_output_classes(
    model_service: &impl ModelService,
    labels: &ClassLabelTable,
) -> Result<(), ModelLoadError> {
    let outputs = model_service
        .run(&InputTensor::zeros())
        .map_err(|e| ModelLoadError::Warmup(e.to_string()))?
        .len();
    if outputs != labels.len() {
        return Err(ModelLoadError::LabelMismatch {
            labels: labels.len(),
            outputs,
        });
    }
    Ok(())
}

/// Index and value of the largest entry. NaN entries are skipped and the
/// lowest index wins a tie.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
}
