//! Credential verification for the WebSocket handshake and the HTTP boundary.
//!
//! The auth service (an external collaborator) issues an HS256 JWT carried in
//! the `accessToken` cookie. We verify signature and expiry once per
//! connection or request; issuance and refresh are out of scope.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{config::Config, error::ApiError};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub exp: i64,
}

/// Verify an access token and return its claims. Expiry is validated.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Token verification failed");
        ApiError::Unauthorized
    })
}

/// Pull the access token out of a raw `Cookie` header value.
pub fn token_from_cookie_header(raw: &str) -> Option<&str> {
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == ACCESS_TOKEN_COOKIE).then_some(value)
    })
}

/// Authenticated user id, extracted from the request's cookie.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<Config>::from_ref(state);
        let raw = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = token_from_cookie_header(raw).ok_or(ApiError::Unauthorized)?;
        let claims = verify_token(token, &config.jwt_secret)?;
        Ok(AuthUser(claims.user_id))
    }
}

#[cfg(test)]
pub fn issue_token(user_id: &str, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    let claims = Claims {
        user_id: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_parsing() {
        assert_eq!(
            token_from_cookie_header("foo=bar; accessToken=abc.def.ghi; x=y"),
            Some("abc.def.ghi")
        );
        assert_eq!(token_from_cookie_header("foo=bar"), None);
        assert_eq!(token_from_cookie_header(""), None);
    }

    #[test]
    fn verify_roundtrip() {
        let token = issue_token("u1", "secret");
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, "u1");

        assert!(verify_token(&token, "other-secret").is_err());
        assert!(verify_token("garbage", "secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let claims = Claims {
            user_id: "u1".into(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
