use crate::{
    modules::extractors::admin::AdminClaims,
    state::AppState,
    utils::tags::{errors::TagError, fetch_tag_groups},
};
use axum::{debug_handler, extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub fn router() -> Router<AppState> {
    Router::new().route("/tag_groups", get(list_tag_groups))
}

#[debug_handler(state = AppState)]
async fn list_tag_groups(
    _claims: AdminClaims,
    State(pool): State<SqlitePool>,
) -> Result<Json<Value>, TagError> {
    let groups = fetch_tag_groups(&pool).await?;
    Ok(Json(json!({ "tag_groups": groups })))
}
