//! Verification of access tokens issued by the managed backend's auth service.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Audience the backend puts in tokens of signed-in users.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing access token")]
    MissingToken,
    #[error("access token expired")]
    TokenExpired,
    #[error("invalid access token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// The signed-in user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    secret: SecretString,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
        validation.required_spec_claims = HashSet::from([
            "sub".to_string(),
            "exp".to_string(),
            "aud".to_string(),
        ]);
        validation.leeway = 30;

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let claims = decode::<AccessTokenClaims>(token, &key, &validation)?.claims;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "test-jwt-secret-with-enough-length";

    fn token(secret: &str, aud: &str, exp_offset: Duration) -> (Uuid, String) {
        let user = Uuid::new_v4();
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user,
            aud: aud.to_string(),
            exp: (now + exp_offset).timestamp(),
            iat: Some(now.timestamp()),
            email: Some("me@example.com".to_string()),
            role: Some("authenticated".to_string()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (user, token)
    }

    fn service() -> AuthService {
        AuthService::new(SecretString::from(SECRET))
    }

    #[test]
    fn test_valid_token() {
        let (user, token) = token(SECRET, AUTHENTICATED_AUDIENCE, Duration::minutes(10));
        let auth = service().verify(&token).unwrap();
        assert_eq!(auth.id, user);
        assert_eq!(auth.email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_expired_token() {
        let (_, token) = token(SECRET, AUTHENTICATED_AUDIENCE, Duration::minutes(-10));
        assert!(matches!(service().verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_or_audience() {
        let (_, token) = token("another-secret", AUTHENTICATED_AUDIENCE, Duration::minutes(10));
        assert!(matches!(service().verify(&token), Err(AuthError::InvalidToken)));

        let (_, token) = self::token(SECRET, "anon", Duration::minutes(10));
        assert!(matches!(service().verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_empty_token() {
        assert!(matches!(service().verify("  "), Err(AuthError::MissingToken)));
    }
}
