use config::{Config, ConfigError};
use secrecy::Secret;
use serde::Deserialize;
use sqlx::sqlite::SqliteConnectOptions;
use std::{net::SocketAddr, path::PathBuf, str::FromStr};
use tracing::info;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub app: ApplicationSettings,
    pub database: DatabaseSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub jwt_secret: Secret<String>,
    pub origin: String,
}

impl ApplicationSettings {
    pub fn get_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::Message(format!("Failed to parse address {addr}: {e}")))
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: "0.0.0.0".into(),
            port: get_env("PORT")?
                .parse::<u16>()
                .map_err(|_| ConfigError::Message("Invalid port number".into()))?,
            jwt_secret: Secret::from(get_env("JWT_SECRET")?),
            origin: get_env("WEBSITE_URL")?,
        })
    }
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    database_url: Option<String>,
    path: Option<PathBuf>,
    is_migrating: Option<bool>,
}

impl DatabaseSettings {
    pub fn new(database_url: Option<String>, path: Option<PathBuf>, is_migrating: bool) -> Self {
        Self {
            database_url,
            path,
            is_migrating: Some(is_migrating),
        }
    }

    pub fn is_migrating(&self) -> bool {
        self.is_migrating.unwrap_or(false)
    }

    /// Resolves connect options from the url field, then the file path, then `DATABASE_URL`.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions, ConfigError> {
        if let Some(url) = &self.database_url {
            info!("Using field url for sqlite");
            return parse_url(url);
        }
        if let Some(path) = &self.path {
            info!("Using file {} for sqlite", path.display());
            return Ok(SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true));
        }
        let url = try_get_env("DATABASE_URL")
            .ok_or_else(|| ConfigError::Message("No database connection info provided".into()))?;
        info!("Using env url for sqlite");
        parse_url(&url)
    }

    fn from_env() -> Self {
        Self {
            database_url: try_get_env("DATABASE_URL"),
            path: None,
            is_migrating: Some(true),
        }
    }
}

fn parse_url(url: &str) -> Result<SqliteConnectOptions, ConfigError> {
    SqliteConnectOptions::from_str(url)
        .map(|options| options.create_if_missing(true))
        .map_err(|e| ConfigError::Message(format!("Invalid database url: {e}")))
}

enum Environment {
    Local,
    Production,
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not supported environment. Use either `local` or `production`"
            )),
        }
    }
}

pub fn get_config() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {e}")))?;
    let config_dir = base_path.join("configuration");

    let environment = match std::env::var("APP_ENVIRONMENT") {
        Ok(env) => Environment::try_from(env).map_err(ConfigError::Message)?,
        Err(_) => Environment::Local,
    };

    match environment {
        Environment::Local => Config::builder()
            .add_source(config::File::from(config_dir.join("settings.toml")))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize(),
        Environment::Production => Ok(Settings {
            app: ApplicationSettings::from_env()?,
            database: DatabaseSettings::from_env(),
        }),
    }
}

fn try_get_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn get_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Message(format!("Missing {name}")))
}
