use crate::errors::ErrorResponse;
use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for TagError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match &self {
            TagError::InvalidTag(_) => StatusCode::BAD_REQUEST,
            TagError::Unexpected(e) => {
                tracing::error!("Internal server error: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let info = match self {
            TagError::Unexpected(_) => ErrorResponse::UNEXPECTED.into(),
            _ => self.to_string(),
        };

        (status_code, ErrorResponse::json(info)).into_response()
    }
}
