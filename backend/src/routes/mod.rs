use axum::{
    debug_handler,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{configuration::Settings, modules::clock::SharedClock, state::AppState};

pub mod messages;
pub mod tag_groups;

pub async fn app(
    config: Settings,
    test_pool: Option<SqlitePool>,
    clock: Option<SharedClock>,
) -> anyhow::Result<Router> {
    let origin = config.app.origin.parse::<HeaderValue>()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let v1 = Router::new()
        .merge(messages::router())
        .merge(tag_groups::router());

    let api = Router::new()
        .nest("/v1", v1)
        .route("/health", get(health_check))
        .with_state(AppState::new(config, test_pool, clock).await?)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(Router::new().nest("/api", api))
}

#[debug_handler]
async fn health_check(State(pool): State<SqlitePool>) -> impl IntoResponse {
    let is_database_connected = sqlx::query("select 1").fetch_one(&pool).await.is_ok();
    if is_database_connected {
        return (
            StatusCode::OK,
            Json(json!({"status": "all backend services are working properly"})),
        );
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"status":"database unavailable"})),
    )
}
