use std::time::Duration;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::models::Identity;

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    hash(plain, cost).map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}

pub fn verify_password(plain: &str, password_hash: &str) -> Result<bool, AppError> {
    verify(plain, password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))
}

pub fn issue_token(
    user_id: &str,
    username: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        user_id: user_id.to_string(),
        username: username.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("JWT generation error: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))
}

/// Pulls the session token out of a raw `Cookie` header.
pub fn token_from_cookies(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from an optional `Cookie` header.
pub fn claims_from_cookie_header(header: Option<&str>, secret: &str) -> Result<Claims, AppError> {
    let token = header
        .and_then(token_from_cookies)
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

    verify_token(token, secret).map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

fn cookie_attributes(config: &Config) -> &'static str {
    if config.cookie_secure {
        "Path=/; HttpOnly; SameSite=None; Secure"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

pub fn session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{TOKEN_COOKIE}={token}; Max-Age={}; {}",
        config.token_ttl.as_secs(),
        cookie_attributes(config)
    )
}

pub fn expired_cookie(config: &Config) -> String {
    format!(
        "{TOKEN_COOKIE}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}",
        cookie_attributes(config)
    )
}
