use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::intake::IntakeError;
use crate::session::errors::SessionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Method {0} is not allowed here")]
    MethodNotAllowed(String),
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// The uniform error body returned by every endpoint.
/// `path` is empty until `attach_error_path` fills it from the request URI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
}

const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Session(err) => match err {
                SessionError::SessionNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Session Not Found", err.to_string())
                }
                SessionError::SessionConflict(_) => {
                    (StatusCode::CONFLICT, "Session Already Exists", err.to_string())
                }
                SessionError::InvalidState(_) => (
                    StatusCode::BAD_REQUEST,
                    "Invalid Session State",
                    err.to_string(),
                ),
                SessionError::AnswerAlreadySubmitted(_) => (
                    StatusCode::BAD_REQUEST,
                    "Answer Already Submitted",
                    err.to_string(),
                ),
                SessionError::SessionTimeNotCompleted { .. } => (
                    StatusCode::BAD_REQUEST,
                    "Session Time Not Completed",
                    err.to_string(),
                ),
                SessionError::ConcurrentModification(_) => (
                    StatusCode::CONFLICT,
                    "Concurrent Modification",
                    err.to_string(),
                ),
                SessionError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "Validation Failed", msg.clone())
                }
                SessionError::Transcription(msg) | SessionError::Agent(msg) => {
                    tracing::error!("Upstream AI failure: {msg}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "Upstream Service Error",
                        err.to_string(),
                    )
                }
                SessionError::Store(e) => {
                    tracing::error!("Session store error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error",
                        GENERIC_MESSAGE.to_string(),
                    )
                }
            },
            AppError::Intake(err) => match err {
                IntakeError::TooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "File Too Large", err.to_string())
                }
                IntakeError::Storage(msg) => {
                    tracing::error!("File upload failed: {msg}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "File Upload Failed",
                        "Failed to store the uploaded file".to_string(),
                    )
                }
                _ => (StatusCode::BAD_REQUEST, "Invalid File", err.to_string()),
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation Failed", msg.clone())
            }
            AppError::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
                self.to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.classify();

        if status.is_client_error() {
            tracing::warn!("{error}: {message}");
        }

        let remaining_minutes = match &self {
            AppError::Session(SessionError::SessionTimeNotCompleted { remaining_minutes }) => {
                Some(*remaining_minutes)
            }
            _ => None,
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: error.to_string(),
            message,
            path: String::new(),
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            remaining_minutes,
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

/// Middleware that stamps the request path into any `ErrorBody` produced downstream.
pub async fn attach_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<ErrorBody>() {
        Some(mut body) => {
            body.path = path;
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}
