use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::batch::selection::SelectionError;
use crate::batch::sink::DeliveryError;
use crate::email::draft::ComposeError;
use crate::extraction::provider::ExtractionError;

/// API error types, rendered as `{"detail": "..."}`
#[derive(Debug, Clone)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m) => m,
            ApiError::Forbidden(m) => m,
            ApiError::NotFound(m) => m,
            ApiError::InternalError(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self.message());
        }
        let body = Json(serde_json::json!({ "detail": self.message() }));
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{:#}", err))
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Malformed upload: {}", err))
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        let message = err.to_string();
        match err {
            ExtractionError::FolderNotFound(_)
            | ExtractionError::NotADirectory(_)
            | ExtractionError::NoFilesUploaded
            | ExtractionError::NoValidPdfs => ApiError::BadRequest(message),
            ExtractionError::PermissionDenied(_) => ApiError::Forbidden(message),
            ExtractionError::NoPdfFiles => ApiError::NotFound(message),
            ExtractionError::Io { .. } => ApiError::InternalError(message),
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ComposeError> for ApiError {
    fn from(err: ComposeError) -> Self {
        let message = err.to_string();
        match err {
            ComposeError::MissingRecipient => ApiError::BadRequest(message),
            ComposeError::AttachmentNotFound(_) => ApiError::NotFound(message),
            ComposeError::AttachmentUnreadable { .. } | ComposeError::Serialization(_) => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
