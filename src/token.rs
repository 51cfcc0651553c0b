use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ConfigError, TokenError},
    models::{Identity, Role},
};

/// Claims
///
/// The payload signed into every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the identity id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued At (iat), unix seconds.
    pub iat: i64,
    /// Expiration Time (exp), unix seconds. A token is dead once `exp <= now`.
    pub exp: i64,
}

impl Claims {
    pub fn for_identity(identity: &Identity, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            iat,
            exp: iat + ttl.num_seconds(),
        }
    }
}

/// TokenService
///
/// Issues and verifies HS256 session tokens under a single process-wide secret.
/// Stateless apart from its keys; safe to clone into every request.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    leeway_secs: i64,
}

impl TokenService {
    /// Fails with `ConfigError::MissingSecret` when the secret is empty.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret("JWT_SECRET"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `verify_at` so `exp <= now` counts as expired.
        validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            leeway_secs: 0,
        })
    }

    /// Accepts tokens up to `seconds` past their expiry. Zero by default.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_secs = i64::try_from(seconds).unwrap_or(i64::MAX);
        self
    }

    /// Issues a token valid for the configured time-to-live.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, self.ttl, Utc::now())
    }

    /// Issues a token with a lifetime other than the configured one.
    pub fn issue_with_ttl(
        &self,
        identity: &Identity,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(identity, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims::for_identity(identity, issued_at, ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// The single verification path used by both mandatory and optional authentication.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.exp <= now.timestamp().saturating_sub(self.leeway_secs) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
