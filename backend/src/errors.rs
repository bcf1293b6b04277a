use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

const BACKTRACE_DEPTH: usize = 5;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{code} - {message}")]
    Expected { code: StatusCode, message: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Body text of every 500; details stay in the log.
    pub const UNEXPECTED: &'static str = "Unexpected server error";

    /// The `{"error": ...}` body shared by every failing endpoint.
    pub fn json(error: String) -> Json<Self> {
        Json(Self { error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_message = self.to_string();
        let (code, message) = match self {
            AppError::Expected { code, message } => {
                debug!("{error_message}");
                (code, ErrorResponse::json(message))
            }
            AppError::Unexpected(e) => {
                let backtrace = e.backtrace();
                let filtered_backtrace = backtrace
                    .to_string()
                    .lines()
                    .take(2 * BACKTRACE_DEPTH)
                    .collect::<Vec<&str>>()
                    .join("\n");
                if &filtered_backtrace == "disabled backtrace" {
                    error!("{error_message}");
                } else {
                    error!("{error_message}\n\n{filtered_backtrace}");
                }

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::json(ErrorResponse::UNEXPECTED.into()),
                )
            }
        };
        (code, message).into_response()
    }
}

impl AppError {
    pub fn exp(code: StatusCode, message: &str) -> Self {
        Self::Expected {
            code,
            message: message.to_string(),
        }
    }
}

