use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Local failure of a single remote call.
///
/// Errors reported by the service itself (an `error` field in a well-formed
/// response) are not client errors; they travel inside `ApiResponse`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("API returned status: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Rejected track: {0}")]
    InvalidTrack(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote call failed: {0}")]
    Remote(#[from] ClientError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidArgument(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Remote(ref e) => {
                tracing::error!("Remote error: {:?}", e);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Config(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string())
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
