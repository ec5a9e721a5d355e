use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde_json::json;
use thiserror::Error;

/// Request-failure taxonomy for the API layer. External-service failures
/// never surface here: they collapse to fallbacks inside the pipeline. Only
/// auth, precondition, not-found and genuinely unexpected conditions
/// short-circuit a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("User not found")]
    UserNotFound,
    #[error("No photos found. Please upload a photo first.")]
    PhotoRequired,
    #[error("Gender preference is required for virtual try-on. Please update your profile.")]
    GenderRequired,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Internal {
        message: String,
        details: String,
    },
}

impl ApiError {
    pub fn internal(message: &str, source: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: message.to_string(),
            details: source.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PhotoRequired | ApiError::GenderRequired | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::PhotoRequired =>
                json!({
                    "error": self.to_string(),
                    "needsPhoto": true,
                }),
            ApiError::GenderRequired =>
                json!({
                    "error": self.to_string(),
                    "code": "GENDER_REQUIRED",
                    "redirectTo": "/profile",
                }),
            ApiError::Internal { message, details } => {
                error!("Internal error: {}: {}", message, details);
                json!({
                    "error": message,
                    "details": details,
                })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ApiError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ApiError::internal("Unexpected error", err)
    }
}
