use crate::{errors::ErrorResponse, utils::tags::errors::TagError};
use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Message {0} not found")]
    NotFound(i64),
    #[error("Missing message ID")]
    MissingIdentifier,
    #[error("Invalid message ID: {0}")]
    InvalidIdentifier(String),
    #[error("Invalid JSON: {0}")]
    MalformedRequest(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Invalid expires: expires precedes begins")]
    InvalidExpires,
    #[error("Invalid level: {0}")]
    InvalidLevel(i64),
    #[error("Invalid timestamp: {0} is out of range")]
    InvalidTimestamp(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<TagError> for MessageError {
    fn from(val: TagError) -> Self {
        match val {
            TagError::InvalidTag(name) => Self::InvalidTag(name),
            TagError::Unexpected(e) => Self::Unexpected(e),
        }
    }
}

impl IntoResponse for MessageError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match &self {
            MessageError::NotFound(_) => StatusCode::NOT_FOUND,
            MessageError::MissingIdentifier => StatusCode::BAD_REQUEST,
            MessageError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            MessageError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            MessageError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            MessageError::InvalidTag(_) => StatusCode::BAD_REQUEST,
            MessageError::InvalidExpires => StatusCode::BAD_REQUEST,
            MessageError::InvalidLevel(_) => StatusCode::BAD_REQUEST,
            MessageError::InvalidTimestamp(_) => StatusCode::BAD_REQUEST,
            MessageError::Unexpected(e) => {
                tracing::error!("Internal server error: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let info = match self {
            MessageError::Unexpected(_) => ErrorResponse::UNEXPECTED.into(),
            _ => {
                tracing::debug!("{self}");
                self.to_string()
            }
        };

        (status_code, ErrorResponse::json(info)).into_response()
    }
}
