use std::collections::BTreeMap;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use serde::Serialize;

use crate::classifier::Classifier;
use crate::config::{self, AppConfig};
use crate::error::ApiError;
use crate::medical;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model_mode: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct PredictResponse {
    prediction: String,
    confidence: f32,
    confidence_scores: BTreeMap<&'static str, f32>,
    processing_time: f64,
    medical_info: serde_json::Value,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: String) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        // Registered last so API routes win; actix-files sanitizes paths,
        // so `GET /<path>` cannot escape the frontend directory.
        .service(Files::new("/", frontend_dir).index_file("index.html"));
}

async fn health(classifier: web::Data<Classifier>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        model_mode: classifier.mode(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn predict(
    classifier: web::Data<Classifier>,
    config: web::Data<AppConfig>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let image_data = read_image_field(payload, &config).await?;

    let request_id = format!("req_{}", Utc::now().format("%Y%m%d_%H%M%S%3f"));
    info!("[{}] received {} byte upload", request_id, image_data.len());

    let result = classifier.predict(&image_data).map_err(|e| {
        error!("[{}] prediction error: {}", request_id, e);
        e
    })?;

    info!(
        "[{}] predicted '{}' (confidence {:.4}) in {:.3}s",
        request_id, result.label, result.confidence, result.processing_time
    );

    Ok(HttpResponse::Ok().json(PredictResponse {
        prediction: result.label.to_string(),
        confidence: result.confidence,
        confidence_scores: result.scores,
        processing_time: result.processing_time,
        medical_info: medical::lookup_json(result.label),
    }))
}

/// Pulls the `image` field out of the multipart stream, enforcing the
/// filename and size rules before any decoding happens.
async fn read_image_field(mut payload: Multipart, config: &AppConfig) -> Result<Vec<u8>, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item?;
        if field.name() != Some("image") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("")
            .to_owned();
        if filename.is_empty() {
            return Err(ApiError::EmptyFilename);
        }
        if !config::is_allowed_file(&filename) {
            let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            return Err(ApiError::UnsupportedExtension(ext.to_string()));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > config.max_upload_bytes {
                return Err(ApiError::PayloadTooLarge(config.max_upload_mb()));
            }
            data.extend_from_slice(&chunk);
        }
        return Ok(data);
    }

    Err(ApiError::MissingImage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test};
    use serde_json::Value;
    use std::io::Cursor;

    use crate::classifier::CLASS_NAMES;

    const BOUNDARY: &str = "predict-test-boundary";

    fn test_config(max_upload_bytes: usize) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            frontend_dir: ".".to_string(),
            model_path: "/nonexistent/brain_model.onnx".to_string(),
            max_upload_bytes,
            rate_per_minute: 50,
            rate_per_day: 1000,
        }
    }

    fn png_fixture() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 120, 200]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn multipart_body(name: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn call_predict(
        config: AppConfig,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Classifier::Mock))
                .app_data(web::Data::new(config))
                .service(web::resource("/predict").route(web::post().to(predict)))
                .service(web::resource("/health").route(web::get().to(health))),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();

        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let json = test::read_body_json(resp).await;
        (status, json)
    }

    #[actix_web::test]
    async fn predict_without_image_field_is_400() {
        let body = multipart_body("file", "scan.png", &png_fixture());
        let (status, json) = call_predict(test_config(10 * 1024 * 1024), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image uploaded");
    }

    #[actix_web::test]
    async fn predict_with_empty_filename_is_400() {
        let body = multipart_body("image", "", &png_fixture());
        let (status, json) = call_predict(test_config(10 * 1024 * 1024), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file selected");
    }

    #[actix_web::test]
    async fn predict_with_disallowed_extension_is_400() {
        let body = multipart_body("image", "scan.exe", &png_fixture());
        let (status, json) = call_predict(test_config(10 * 1024 * 1024), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File type 'exe' is not allowed");
    }

    #[actix_web::test]
    async fn predict_rejects_oversized_upload() {
        let oversized = vec![0u8; 1024 * 1024 + 1];
        let body = multipart_body("image", "scan.png", &oversized);
        let (status, json) = call_predict(test_config(1024 * 1024), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File exceeds the 1 MB upload limit");
    }

    #[actix_web::test]
    async fn predict_with_undecodable_image_is_500() {
        let body = multipart_body("image", "scan.png", b"not really a png");
        let (status, json) = call_predict(test_config(10 * 1024 * 1024), body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to decode image")
        );
    }

    #[actix_web::test]
    async fn mock_predict_returns_fixed_confidences() {
        let body = multipart_body("image", "scan.png", &png_fixture());
        let (status, json) = call_predict(test_config(10 * 1024 * 1024), body).await;
        assert_eq!(status, StatusCode::OK);

        let prediction = json["prediction"].as_str().unwrap();
        assert!(CLASS_NAMES.contains(&prediction));
        assert!((json["confidence"].as_f64().unwrap() - 0.98).abs() < 1e-6);
        assert!((json["processing_time"].as_f64().unwrap() - 0.1).abs() < 1e-9);

        let scores = json["confidence_scores"].as_object().unwrap();
        assert_eq!(scores.len(), CLASS_NAMES.len());
        for name in CLASS_NAMES {
            let expected = if name == prediction { 0.98 } else { 0.01 };
            assert!((scores[name].as_f64().unwrap() - expected).abs() < 1e-6);
        }

        let medical = json["medical_info"].as_object().unwrap();
        assert!(!medical["description"].as_str().unwrap().is_empty());
        assert!(!medical["urgency"].as_str().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn health_reports_mock_mode() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Classifier::Mock))
                .service(web::resource("/health").route(web::get().to(health))),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["model_mode"], "Mock");
        assert!(!json["timestamp"].as_str().unwrap().is_empty());
    }
}
