use crate::{errors::AppError, state::AppState};
use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use time::Duration;

pub const TOKEN_COOKIE: &str = "jwt";

#[derive(Clone)]
pub struct JwtSecret(pub Secret<String>);

/// Identity asserted by the host site. Only holders of `is_admin` reach the message API.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub is_admin: bool,
    pub exp: u64,
}

impl AdminClaims {
    pub fn new(username: &str, is_admin: bool, duration: Duration) -> Self {
        Self {
            sub: username.to_string(),
            is_admin,
            exp: jsonwebtoken::get_current_timestamp() + duration.whole_seconds().unsigned_abs(),
        }
    }

    pub fn username(&self) -> &str {
        &self.sub
    }

    pub fn encode(&self, secret: &JwtSecret) -> Result<String, AppError> {
        let token = encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.0.expose_secret().as_bytes()),
        )
        .context("Failed to encode the admin JWT")?;
        Ok(token)
    }

    pub fn decode(token: &str, secret: &JwtSecret) -> Result<Self, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 5;

        let decoding_key = DecodingKey::from_secret(secret.0.expose_secret().as_bytes());
        let claims = decode::<Self>(token, &decoding_key, &validation)
            .map_err(|_| AppError::exp(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?
            .claims;

        Ok(claims)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        req: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(req, state)
            .await
            .context("Failed to fetch cookie jar")?;

        let token = match jar.get(TOKEN_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => bearer_token(req)
                .ok_or(AppError::exp(StatusCode::UNAUTHORIZED, "No access token found"))?,
        };

        let claims = AdminClaims::decode(&token, &state.jwt_secret)?;
        if !claims.is_admin {
            return Err(AppError::exp(StatusCode::UNAUTHORIZED, "Access denied"));
        }
        Ok(claims)
    }
}

fn bearer_token(req: &Parts) -> Option<String> {
    let value = req.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}
