use crate::utils::messages::{
    errors::MessageError,
    models::{ActiveFilter, ActiveQuery},
};
use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{rejection::PathRejection, FromRequestParts, Path, Query},
    http::request::Parts,
};

/// Numeric id from the `:message_id` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for MessageId
where
    S: Send + Sync,
{
    type Rejection = MessageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| match rejection {
                PathRejection::FailedToDeserializePathParams(e) => {
                    MessageError::InvalidIdentifier(e.body_text())
                }
                other => MessageError::Unexpected(anyhow!(other.body_text())),
            })?;

        raw.parse()
            .map(Self)
            .map_err(|_| MessageError::InvalidIdentifier(raw))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActiveFilter
where
    S: Send + Sync,
{
    type Rejection = MessageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ActiveQuery>::try_from_uri(&parts.uri).map_err(|_| {
            MessageError::InvalidQuery(parts.uri.query().unwrap_or_default().to_string())
        })?;

        ActiveFilter::try_from(query)
    }
}
