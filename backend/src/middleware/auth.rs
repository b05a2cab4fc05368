//! Bearer token authentication
//!
//! Tokens are HS256 JWTs issued by the identity service; `sub` carries the
//! user id. Handlers pull the caller out with [`CurrentUser`] where a login is
//! required and [`OptionalUser`] where it only personalises the answer.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Sign a token for `user_id` valid for `ttl`
pub fn issue_token(user_id: &str, secret: &str, ttl: Duration) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// `None` when no Authorization header is present
fn authenticate(parts: &Parts, secret: &str) -> AppResult<Option<AuthUser>> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let claims = decode_jwt(token, secret)?;
    if claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized("Token has no subject".into()));
    }
    Ok(Some(AuthUser {
        user_id: claims.sub,
    }))
}

/// Extractor for a required login
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, &state.config.auth.jwt_secret)?
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// Extractor for an optional login; a token that is present must be valid
#[derive(Clone, Debug)]
pub struct OptionalUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, &state.config.auth.jwt_secret).map(OptionalUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_valid_token() {
        let token = issue_token("user-1", "secret", Duration::hours(1)).unwrap();
        let parts = parts_with(Some(&format!("Bearer {}", token)));
        let user = authenticate(&parts, "secret").unwrap();
        assert_eq!(user.map(|u| u.user_id), Some("user-1".to_string()));
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(authenticate(&parts_with(None), "secret").unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let token = issue_token("user-1", "other", Duration::hours(1)).unwrap();
        let wrong_secret = parts_with(Some(&format!("Bearer {}", token)));
        assert!(matches!(
            authenticate(&wrong_secret, "secret"),
            Err(AppError::Unauthorized(_))
        ));

        let expired = issue_token("user-1", "secret", Duration::hours(-2)).unwrap();
        let expired = parts_with(Some(&format!("Bearer {}", expired)));
        assert!(authenticate(&expired, "secret").is_err());

        let basic = parts_with(Some("Basic dXNlcjpwYXNz"));
        assert!(authenticate(&basic, "secret").is_err());
    }
}
