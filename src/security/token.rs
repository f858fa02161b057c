//! Bearer token verification.
//!
//! This module provides the token verification seam used by the token
//! filter: a local HMAC JWT verifier and a remote introspection verifier.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, AuthMode};

/// Token verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("malformed authorization header")]
    Malformed,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token is not active")]
    Inactive,

    #[error("token verifier unavailable: {0}")]
    Unavailable(String),

    #[error("token verification timed out after {0}ms")]
    Timeout(u64),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedToken {
    pub subject: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Validates bearer tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw token (without the `Bearer ` prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be checked.
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

/// Build the verifier selected by the configuration.
pub fn from_config(config: &AuthConfig) -> Result<Box<dyn TokenVerifier>, AuthError> {
    match config.mode {
        AuthMode::Jwt => Ok(Box::new(JwtVerifier::new(config)?)),
        AuthMode::Introspection => Ok(Box::new(IntrospectionVerifier::new(config)?)),
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.map(str::trim).filter(|v| !v.is_empty()).ok_or(AuthError::Missing)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Missing);
    }
    Ok(token)
}

/// Raw claims checked by the JWT verifier.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    exp: u64,
}

/// HMAC-signed JWT verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| AuthError::UnsupportedAlgorithm(config.algorithm.clone()))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::UnsupportedAlgorithm(config.algorithm.clone()));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Invalid(e.to_string()),
            }
        })?;

        let exp = i64::try_from(data.claims.exp).unwrap_or(i64::MAX);
        Ok(VerifiedToken {
            subject: data.claims.sub,
            expires_at: DateTime::from_timestamp(exp, 0),
        })
    }
}

/// Introspection endpoint response.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Remote verifier: posts the token to an introspection endpoint.
pub struct IntrospectionVerifier {
    url: String,
    client: reqwest::Client,
}

impl IntrospectionVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let url = config
            .introspection_url
            .clone()
            .ok_or_else(|| AuthError::Unavailable("no introspection url configured".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.verify_timeout_ms))
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl TokenVerifier for IntrospectionVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Unavailable(format!(
                "introspection returned {}",
                response.status()
            )));
        }

        let body: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if !body.active {
            return Err(AuthError::Inactive);
        }

        let expires_at = body.exp.and_then(|exp| DateTime::from_timestamp(exp, 0));
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(AuthError::Expired);
        }

        Ok(VerifiedToken {
            subject: body.sub,
            expires_at,
        })
    }
}

/// Verifier that accepts a fixed set of opaque tokens. Used by tests.
#[cfg(test)]
pub struct StaticTokenVerifier {
    pub valid: Vec<String>,
    pub delay: Option<Duration>,
}

#[cfg(test)]
#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.valid.iter().any(|t| t == token) {
            Ok(VerifiedToken {
                subject: Some(token.to_string()),
                expires_at: None,
            })
        } else {
            Err(AuthError::Invalid("unknown token".into()))
        }
    }
}
