use crate::api::models::ErrorResponse;
use crate::gemini::ProviderError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed multipart body or missing required parts
    #[error("{message}")]
    InvalidUpload { message: String },

    /// Temporary file handling failed while spooling the upload
    #[error("temporary file error: {0}")]
    TempFile(#[from] std::io::Error),

    /// Any failure reported by the transcription provider
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Every relay failure maps to the same status; the split between kinds
    /// lives in the logs and in [`Error::user_message`].
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Returns a user-safe error message, without leaking provider or filesystem detail
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidUpload { message } => message.clone(),
            Error::TempFile(_) | Error::Provider(_) | Error::Internal { .. } | Error::Other(_) => {
                "An error occurred while processing the audio".to_string()
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Provider(e) => {
                tracing::error!("Provider call failed: {}", e);
            }
            Error::TempFile(e) => {
                tracing::error!("Upload spooling failed: {}", e);
            }
            Error::Internal { .. } => {
                tracing::error!("Internal service error: {}", self);
            }
            Error::Other(e) => {
                tracing::error!("Internal service error: {:#}", e);
            }
            Error::InvalidUpload { .. } => {
                tracing::warn!("Rejected upload: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
