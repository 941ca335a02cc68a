use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upload too large: {0}")]
    UploadTooLarge(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Message safe to show to clients, paired with a stable error code.
    pub fn user_message(&self) -> (&str, u16) {
        match self {
            AppError::WebSocketError(_) => ("Connection error occurred", 1001),
            AppError::ParseError(_) => ("Invalid message format", 1002),
            AppError::InternalError(_) | AppError::Database(_) => {
                ("Server encountered an error", 1005)
            }
            AppError::Unauthorized(msg) => (msg.as_str(), 1007),
            AppError::UploadTooLarge(_) => ("Attachment exceeds size limit", 1009),
            AppError::Conflict(msg) => (msg.as_str(), 1011),
            AppError::InvalidUpload(_) => ("Attachment could not be decoded", 1012),
            AppError::Validation(msg) => (msg.as_str(), 1013),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ParseError(_) | AppError::InvalidUpload(_) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Full error text for server logs, tagged with the client-facing code.
    pub fn log_details(&self) -> String {
        let (_, code) = self.user_message();
        format!("[{code}] {self}")
    }

    /// Error frame sent back over a socket; the socket stays open.
    pub fn to_frame(&self) -> String {
        let (user_msg, code) = self.user_message();
        serde_json::json!({
            "message_type": "error",
            "error": user_msg,
            "code": code,
        })
        .to_string()
    }
}

impl Reject for AppError {}

#[derive(Serialize)]
struct ErrorMessage {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    let (error_message, status_code, error_code, details) =
        if let Some(app_error) = err.find::<AppError>() {
            let (msg, code) = app_error.user_message();
            let status = app_error.status();

            if status.is_server_error() {
                error!("API error: {}", app_error.log_details());
            } else {
                warn!("API error: {}", app_error.log_details());
            }

            #[cfg(debug_assertions)]
            let details = Some(app_error.to_string());

            #[cfg(not(debug_assertions))]
            let details = None;

            (msg.to_string(), status, code, details)
        } else if err.is_not_found() {
            ("Resource not found".to_string(), StatusCode::NOT_FOUND, 1404, None)
        } else if err
            .find::<warp::filters::body::BodyDeserializeError>()
            .is_some()
        {
            ("Invalid request data".to_string(), StatusCode::BAD_REQUEST, 1400, None)
        } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
            (
                "Method not allowed".to_string(),
                StatusCode::METHOD_NOT_ALLOWED,
                1405,
                None,
            )
        } else {
            error!("Unhandled rejection: {err:?}");
            (
                "Internal Server Error".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
                1500,
                None,
            )
        };

    let json = warp::reply::json(&ErrorMessage {
        error: error_message,
        code: error_code,
        details,
    });

    Ok(warp::reply::with_status(json, status_code))
}
