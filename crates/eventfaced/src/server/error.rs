use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eventface_core::{DetectionError, DownloadError, EnrollError, ProcessError, ValidationError};
use eventface_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Every failure a handler can report, with its HTTP mapping.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Download(DownloadError),
    #[error(transparent)]
    Detection(DetectionError),
    #[error("no face detected in {0}")]
    NoFaceDetected(String),
    #[error("event {0} not found")]
    EventNotFound(String),
    #[error("{0}")]
    Registry(StoreError),
    #[error("{0}")]
    Persist(StoreError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Download(_) => StatusCode::BAD_GATEWAY,
            ApiError::Detection(DetectionError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Detection(_) | ApiError::NoFaceDetected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EventNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Registry(_)
            | ApiError::Persist(_)
            | ApiError::Store(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => "invalid request",
            ApiError::Download(_) => "unable to access the image URL",
            ApiError::Detection(DetectionError::Unavailable) => "face detector unavailable",
            ApiError::Detection(_) => "face detection failed",
            ApiError::NoFaceDetected(_) => "no face detected",
            ApiError::EventNotFound(_) => "event not found",
            ApiError::Registry(_) => "identity registry unavailable",
            ApiError::Persist(_) => "failed to persist results",
            ApiError::Store(_) => "database error",
            ApiError::Internal(_) => "internal error",
        }
    }
}

impl From<EnrollError> for ApiError {
    fn from(err: EnrollError) -> Self {
        match err {
            EnrollError::NoFaceDetected(url) => ApiError::NoFaceDetected(url),
            EnrollError::Process(ProcessError::Download(e)) => ApiError::Download(e),
            EnrollError::Process(ProcessError::Detection(e)) => ApiError::Detection(e),
            EnrollError::Process(e @ ProcessError::Matching(_)) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        let body = json!({
            "error": self.summary(),
            "details": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
