use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use tcr_core::media::DecodeError;

/// Every way a request can fail, mapped onto the `{success:false, error}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing user_id or photo_data")]
    MissingFields,

    #[error("Access denied. Wrong user ID.")]
    AccessDenied,

    #[error("BOT_TOKEN not configured on server")]
    BotTokenMissing,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Body could not be read or parsed (bad JSON, broken multipart, too large).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Provider refused or failed the delivery.
    #[error("{0}")]
    Upstream(String),

    #[error("Failed to fetch bot info")]
    BotInfo { details: String },

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFields => StatusCode::BAD_REQUEST,
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::BotTokenMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BotInfo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client mistakes, as opposed to server or provider failures.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::BotInfo { details } => json!({
                "success": false,
                "error": self.to_string(),
                "details": details,
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(r: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::rejected(r.status(), format!("Invalid request body: {}", r.body_text()))
    }
}

impl From<axum::extract::rejection::FormRejection> for ApiError {
    fn from(r: axum::extract::rejection::FormRejection) -> Self {
        ApiError::rejected(r.status(), format!("Invalid request body: {}", r.body_text()))
    }
}

impl From<axum::extract::multipart::MultipartRejection> for ApiError {
    fn from(r: axum::extract::multipart::MultipartRejection) -> Self {
        ApiError::rejected(r.status(), format!("Invalid multipart body: {}", r.body_text()))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::rejected(e.status(), format!("Invalid multipart body: {}", e.body_text()))
    }
}
