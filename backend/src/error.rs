use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;

/// Request-path failures. Validation problems are client errors; anything
/// that goes wrong after a well-formed upload was accepted is a 500, with
/// the error string surfaced in the body like the original service did.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image uploaded")]
    MissingImage,

    #[error("No file selected")]
    EmptyFilename,

    #[error("File type '{0}' is not allowed")]
    UnsupportedExtension(String),

    #[error("File exceeds the {0} MB upload limit")]
    PayloadTooLarge(usize),

    #[error("Too many requests")]
    RateLimited,

    #[error("upload stream error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),

    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage
            | ApiError::EmptyFilename
            | ApiError::UnsupportedExtension(_)
            | ApiError::PayloadTooLarge(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Multipart(_) | ApiError::ImageDecode(_) | ApiError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
