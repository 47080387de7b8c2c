use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use breed_prediction::{
    build_router, predictor::Predictor, preprocessing::InputTensor, ClassLabelTable, Metrics,
    ModelService, PredictionError, SharedState,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::{io::Cursor, sync::Arc};
use tower::ServiceExt;

const BOUNDARY: &str = "breed-prediction-test-boundary";
const GOLDEN_RETRIEVER: usize = 49;

struct MockModelService {
    probabilities: Vec<f32>,
}

impl ModelService for MockModelService {
    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, PredictionError> {
        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        Ok(self.probabilities.clone())
    }
}

struct FailingModelService;

impl ModelService for FailingModelService {
    fn run(&self, _input: &InputTensor) -> Result<Vec<f32>, PredictionError> {
        Err(PredictionError::PredictionFailed("output tensor has rank 0".into()))
    }
}

fn golden_retriever_probabilities() -> Vec<f32> {
    let mut probabilities = vec![0.001; 120];
    probabilities[GOLDEN_RETRIEVER] = 0.881;
    probabilities
}

fn router_with(predictor: Predictor, body_limit_bytes: usize) -> Router {
    build_router(SharedState {
        predictor: Arc::new(predictor),
        metrics: Arc::new(Metrics::new().unwrap()),
        body_limit_bytes,
    })
}

fn loaded_router() -> Router {
    let predictor = Predictor::new(
        MockModelService {
            probabilities: golden_retriever_probabilities(),
        },
        ClassLabelTable::embedded(),
        "models/dog_breeds.onnx",
    );
    router_with(predictor, 16 * 1024 * 1024)
}

fn unloaded_router() -> Router {
    let predictor = Predictor::failed(
        "Model file not found: \"models/dog_breeds.onnx\"",
        ClassLabelTable::embedded(),
        "models/dog_breeds.onnx",
    );
    router_with(predictor, 16 * 1024 * 1024)
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .unwrap();
    cursor.into_inner()
}

fn multipart_request(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_predict_valid_jpeg() {
    let request = multipart_request("file", "dog.jpg", "image/jpeg", &jpeg(500, 500));
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["predicted_breed"], "golden_retriever");
    assert_eq!(json["message"], "Prediction successful");
    let confidence = json["confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
    assert_eq!(confidence, 0.881);
}

#[tokio::test]
async fn test_predict_accepts_file_name_without_file_field() {
    let request = multipart_request("upload", "dog.jpg", "image/jpeg", &jpeg(64, 80));
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["predicted_breed"], "golden_retriever");
}

#[tokio::test]
async fn test_predict_oversized_jpeg() {
    let mut data = jpeg(32, 32);
    data.resize(11 * 1024 * 1024, 0);
    let request = multipart_request("file", "big.jpg", "image/jpeg", &data);
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Maximum size allowed"));
}

#[tokio::test]
async fn test_predict_body_over_transport_limit() {
    let predictor = Predictor::new(
        MockModelService {
            probabilities: golden_retriever_probabilities(),
        },
        ClassLabelTable::embedded(),
        "models/dog_breeds.onnx",
    );
    let router = router_with(predictor, 1024 * 1024);
    let data = vec![7u8; 2 * 1024 * 1024];
    let request = multipart_request("file", "big.jpg", "image/jpeg", &data);
    let (status, json) = send(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Maximum size allowed"));
}

#[tokio::test]
async fn test_predict_rejects_huge_dimensions_in_small_file() {
    let img = RgbImage::from_pixel(10_000, 4, Rgb([200, 180, 90]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    let request = multipart_request("file", "wide.png", "image/png", &cursor.into_inner());
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Image dimensions too large"));
}

#[tokio::test]
async fn test_predict_text_renamed_to_jpg() {
    let request = multipart_request(
        "file",
        "notes.jpg",
        "image/jpeg",
        b"these are my shopping notes, not a dog",
    );
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().contains("corrupted image"));
}

#[tokio::test]
async fn test_predict_unsupported_format() {
    for content_type in ["image/gif", "image/bmp", "text/plain"] {
        let request = multipart_request("file", "dog.gif", content_type, b"GIF89a....");
        let (status, json) = send(loaded_router(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{content_type}");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported file format"));
    }
}

#[tokio::test]
async fn test_predict_without_file() {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("No file uploaded"));
}

#[tokio::test]
async fn test_predict_not_multipart() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send(loaded_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_predict_without_model() {
    let request = multipart_request("file", "dog.jpg", "image/jpeg", &jpeg(100, 100));
    let (status, json) = send(unloaded_router(), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_predict_inference_failure() {
    let predictor = Predictor::new(
        FailingModelService,
        ClassLabelTable::embedded(),
        "models/dog_breeds.onnx",
    );
    let request = multipart_request("file", "dog.jpg", "image/jpeg", &jpeg(100, 100));
    let (status, json) = send(router_with(predictor, 16 * 1024 * 1024), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_concurrent_predictions() {
    let router = loaded_router();
    let image = jpeg(300, 200);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = router.clone();
            let request = multipart_request("file", "dog.jpg", "image/jpeg", &image);
            tokio::spawn(send(router, request))
        })
        .collect();

    for handle in handles {
        let (status, json) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predicted_breed"], "golden_retriever");
    }
}

#[tokio::test]
async fn test_health_without_model() {
    let (status, json) = send(unloaded_router(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["model_loaded"], false);
    assert_eq!(json["model_path"], "models/dog_breeds.onnx");
    assert_eq!(json["num_classes"], 120);
}

#[tokio::test]
async fn test_health_with_model() {
    let (status, json) = send(loaded_router(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Service is running");
    assert_eq!(json["model_loaded"], true);
}

#[tokio::test]
async fn test_root_describes_service() {
    let (status, json) = send(unloaded_router(), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["endpoints"]["health"], "/health");
    assert_eq!(json["endpoints"]["predict"], "/predict (POST)");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let router = loaded_router();
    let request = multipart_request("file", "dog.jpg", "image/jpeg", &jpeg(40, 40));
    let (status, _) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("predictions_total"));
}
