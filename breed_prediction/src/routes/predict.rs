use crate::{
    image_validation::{ImageError, UploadedImage},
    model_service::PredictionError,
    predictor::{PredictionResult, Predictor},
    preprocessing::preprocess,
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status")]
pub enum PredictResponse {
    #[serde(rename = "success")]
    Success {
        predicted_breed: String,
        confidence: f64,
        message: String,
    },
    #[serde(rename = "error")]
    ClientError { message: String },
    #[serde(rename = "error")]
    ServerError { message: String },
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        PredictResponse::Success {
            predicted_breed: result.predicted_breed,
            confidence: round_confidence(result.confidence),
            message: "Prediction successful".into(),
        }
    }
}

fn round_confidence(confidence: f32) -> f64 {
    (confidence as f64 * 10_000.0).round() / 10_000.0
}

#[derive(Error, Debug)]
pub enum PredictImageError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error("No file uploaded. Send the image in a multipart field named `file`")]
    MissingFile,
    #[error("Invalid multipart request: {0}")]
    Multipart(String),
    #[error("Internal server error during prediction: {0}")]
    Internal(String),
}

impl PredictImageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictImageError::Image(_)
            | PredictImageError::MissingFile
            | PredictImageError::Multipart(_) => StatusCode::BAD_REQUEST,
            PredictImageError::Prediction(PredictionError::ModelNotLoaded) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PredictImageError::Prediction(PredictionError::PredictionFailed(_))
            | PredictImageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PredictImageError::Image(ImageError::InvalidFormat(_)) => "invalid_format",
            PredictImageError::Image(ImageError::PayloadTooLarge { .. }) => "payload_too_large",
            PredictImageError::Image(ImageError::DimensionsTooLarge(_)) => "dimensions_too_large",
            PredictImageError::Image(ImageError::CorruptImage(_)) => "corrupt_image",
            PredictImageError::Prediction(PredictionError::ModelNotLoaded) => "model_not_loaded",
            PredictImageError::Prediction(PredictionError::PredictionFailed(_)) => {
                "prediction_failed"
            }
            PredictImageError::MissingFile => "missing_file",
            PredictImageError::Multipart(_) => "invalid_multipart",
            PredictImageError::Internal(_) => "internal",
        }
    }

    fn from_multipart(err: MultipartError, body_limit_bytes: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            PredictImageError::Image(ImageError::PayloadTooLarge {
                size: body_limit_bytes,
            })
        } else {
            PredictImageError::Multipart(err.body_text())
        }
    }
}

impl IntoResponse for PredictImageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        let body = if status.is_client_error() {
            PredictResponse::ClientError { message }
        } else {
            PredictResponse::ServerError { message }
        };
        (status, Json(body)).into_response()
    }
}

struct Upload {
    content_type: Option<String>,
    bytes: Bytes,
}

async fn read_upload(field: Field<'_>) -> Result<Upload, MultipartError> {
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    Ok(Upload {
        content_type,
        bytes,
    })
}

async fn extract_upload(
    mut multipart: Multipart,
    body_limit_bytes: usize,
) -> Result<Upload, PredictImageError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictImageError::from_multipart(e, body_limit_bytes))?
    {
        if field.name() == Some(FILE_FIELD) || field.file_name().is_some() {
            return read_upload(field)
                .await
                .map_err(|e| PredictImageError::from_multipart(e, body_limit_bytes));
        }
    }
    Err(PredictImageError::MissingFile)
}

/// Decode, preprocess and classify one upload. Runs on the blocking pool.
pub fn classify(
    predictor: &Predictor,
    bytes: &[u8],
    content_type: Option<&str>,
) -> Result<PredictionResult, PredictImageError> {
    if !predictor.is_ready() {
        return Err(PredictionError::ModelNotLoaded.into());
    }
    let bitmap = UploadedImage::new(bytes, content_type).validate_and_decode()?;
    let input = preprocess(&bitmap);
    Ok(predictor.predict(&input)?)
}

#[instrument(skip(state, multipart))]
pub async fn predict_breed(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictImageError> {
    state.metrics.record_request("/predict");

    let result = handle_upload(&state, multipart).await;
    match &result {
        Ok(_) => state.metrics.record_prediction("success"),
        Err(err) => state.metrics.record_prediction(err.kind()),
    }

    result.map(|prediction| Json(prediction.into()))
}

async fn handle_upload(
    state: &SharedState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PredictionResult, PredictImageError> {
    let multipart = multipart.map_err(|e| PredictImageError::Multipart(e.body_text()))?;
    let upload = extract_upload(multipart, state.body_limit_bytes)
        .await
        .inspect_err(|e| tracing::warn!(kind = e.kind(), "Rejected upload: {}", e))?;

    let content_type = upload.content_type.clone();
    let size = upload.bytes.len();
    let predictor = state.predictor.clone();

    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        classify(&predictor, &upload.bytes, upload.content_type.as_deref())
    })
    .await
    .map_err(|e| PredictImageError::Internal(format!("prediction task failed: {}", e)))
    .and_then(|result| result);
    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64);

    match &result {
        Ok(prediction) => tracing::info!(
            content_type = content_type.as_deref().unwrap_or("none"),
            size,
            "Predicted {} with confidence {:.4}",
            prediction.predicted_breed,
            prediction.confidence
        ),
        Err(err) if err.status_code().is_client_error() => tracing::warn!(
            content_type = content_type.as_deref().unwrap_or("none"),
            size,
            kind = err.kind(),
            "Rejected upload: {}",
            err
        ),
        Err(err) => tracing::error!(
            content_type = content_type.as_deref().unwrap_or("none"),
            size,
            kind = err.kind(),
            "Prediction failed: {}",
            err
        ),
    }

    result
}
