use crate::{
    modules::extractors::{admin::AdminClaims, message::MessageId},
    state::AppState,
    utils::messages::{
        active_messages, create_message, delete_message,
        errors::MessageError,
        fetch_message, list_for_admin,
        models::{ActiveFilter, MessageDraft, MessagePatch},
        update_message,
    },
};
use axum::{body::Bytes, debug_handler, extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/messages",
            get(list_messages)
                .post(post_message)
                .put(missing_message_id)
                .delete(missing_message_id),
        )
        .route(
            "/messages/:message_id",
            get(get_message).put(put_message).delete(remove_message),
        )
        .route("/active_messages", get(get_active_messages))
}

#[debug_handler(state = AppState)]
async fn list_messages(
    _claims: AdminClaims,
    State(state): State<AppState>,
) -> Result<Json<Value>, MessageError> {
    let now = state.clock.now();
    let messages = list_for_admin(&state.sqlite, now)
        .await?
        .iter()
        .map(|message| message.view(now))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "messages": messages })))
}

#[debug_handler(state = AppState)]
async fn get_message(
    _claims: AdminClaims,
    State(state): State<AppState>,
    MessageId(message_id): MessageId,
) -> Result<Json<Value>, MessageError> {
    let message = fetch_message(&state.sqlite, message_id).await?;

    Ok(Json(json!({ "message": message.view(state.clock.now()) })))
}

#[debug_handler(state = AppState)]
async fn post_message(
    claims: AdminClaims,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, MessageError> {
    let mut draft = MessageDraft::default();
    let tags = MessagePatch::from_body(&body)?.apply(&mut draft)?;

    let now = state.clock.now();
    let message = create_message(
        &state.sqlite,
        &state.sanitizer,
        now,
        draft,
        tags,
        claims.username(),
    )
    .await?;

    Ok(Json(json!({ "message": message.view(now) })))
}

#[debug_handler(state = AppState)]
async fn put_message(
    claims: AdminClaims,
    State(state): State<AppState>,
    MessageId(message_id): MessageId,
    body: Bytes,
) -> Result<Json<Value>, MessageError> {
    // unknown ids answer 404 before the body is looked at
    fetch_message(&state.sqlite, message_id).await?;
    let patch = MessagePatch::from_body(&body)?;

    let now = state.clock.now();
    let message = update_message(
        &state.sqlite,
        &state.sanitizer,
        now,
        message_id,
        patch,
        claims.username(),
    )
    .await?;

    Ok(Json(json!({ "message": message.view(now) })))
}

#[debug_handler(state = AppState)]
async fn remove_message(
    _claims: AdminClaims,
    State(state): State<AppState>,
    MessageId(message_id): MessageId,
) -> Result<Json<Value>, MessageError> {
    delete_message(&state.sqlite, message_id).await?;
    Ok(Json(json!({})))
}

#[debug_handler(state = AppState)]
async fn missing_message_id(_claims: AdminClaims) -> MessageError {
    MessageError::MissingIdentifier
}

#[debug_handler(state = AppState)]
async fn get_active_messages(
    State(state): State<AppState>,
    filter: ActiveFilter,
) -> Result<Json<Value>, MessageError> {
    let now = state.clock.now();
    let messages = active_messages(&state.sqlite, now, &filter)
        .await?
        .iter()
        .map(|message| message.view(now))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "messages": messages })))
}
