use crate::{
    configuration::Settings,
    modules::{
        clock::{SharedClock, SystemClock},
        database::get_sqlite_pool,
        extractors::admin::JwtSecret,
        sanitizer::HtmlSanitizer,
    },
};
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(FromRef, Clone)]
pub struct AppState {
    pub sqlite: SqlitePool,
    pub jwt_secret: JwtSecret,
    pub clock: SharedClock,
    pub sanitizer: Arc<HtmlSanitizer>,
}

impl AppState {
    pub async fn new(
        config: Settings,
        test_pool: Option<SqlitePool>,
        clock: Option<SharedClock>,
    ) -> anyhow::Result<Self> {
        let sqlite = match test_pool {
            Some(pool) => pool,
            None => get_sqlite_pool(config.database).await?,
        };

        Ok(AppState {
            sqlite,
            jwt_secret: JwtSecret(config.app.jwt_secret),
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sanitizer: Arc::new(HtmlSanitizer::new()),
        })
    }
}
