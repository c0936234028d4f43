use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Id;

pub const ADMIN_COOKIE: &str = "admin_token";
pub const SESSION_HOURS: i64 = 8;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hash: {0}")]
    Hash(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Token(_) => ApiError::Unauthorized,
            other => {
                tracing::error!(error = %other, "auth failure");
                ApiError::Internal
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Admin email.
    pub sub: String,
    pub admin_id: Id,
    pub exp: usize,
}

fn jwt_secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

pub fn decode_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = jwt_secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

pub fn create_jwt(admin_id: Id, email: &str) -> Result<String, AuthError> {
    let secret = jwt_secret()?;
    let exp = (chrono::Utc::now() + chrono::Duration::hours(SESSION_HOURS)).timestamp() as usize;
    let claims = Claims { sub: email.to_string(), admin_id, exp };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Extractor yielding validated admin `Claims` from the bearer header or the session cookie.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let token = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => Some(bearer.token().to_string()),
            Err(_) => req.cookie(ADMIN_COOKIE).map(|c| c.value().to_string()),
        };
        let Some(token) = token else {
            return ready(Err(ApiError::Unauthorized));
        };
        ready(decode_jwt(&token).map(Auth).map_err(|e| {
            tracing::debug!(error = %e, "rejected admin token");
            ApiError::Unauthorized
        }))
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// False for a wrong password or an unparsable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
