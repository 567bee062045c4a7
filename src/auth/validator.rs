// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token decoding and verification.
//!
//! There are two read paths and they must not be confused:
//!
//! - [`is_structurally_valid`] and [`extract_subject_unverified`] decode the
//!   token WITHOUT checking its signature. Their output is attacker-controlled
//!   and must never drive an authorization decision.
//! - [`TokenValidator::verify`] checks the signature and standard claims and is
//!   the only way to obtain trusted [`Claims`].
//!
//! ## Verification order
//!
//! 1. Shape (three dot-separated segments, decodable header)
//! 2. Header algorithm equals the configured algorithm
//! 3. Signature
//! 4. Issuer (when enabled)
//! 5. Expiry, then not-before, then issued-at, each with leeway

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, TokenData, Validation};

use super::{Claims, TokenError};
use crate::config::{
    env_optional, DEFAULT_JWT_LEEWAY_SECS, JWT_ALGORITHM_ENV, JWT_ISSUER_ENV, JWT_LEEWAY_SECS_ENV,
    JWT_VERIFY_ISSUER_ENV,
};

/// Token verification settings supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    /// Whether the `iss` claim must equal [`issuer`](Self::issuer).
    pub verify_issuer: bool,
    /// Expected issuer.
    pub issuer: String,
    /// The only algorithm accepted in the token header.
    pub algorithm: Algorithm,
    /// Clock skew tolerance applied to `exp`, `nbf` and `iat`.
    pub leeway: Duration,
    /// Reject tokens without an `exp` claim.
    pub require_expiry: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            verify_issuer: false,
            issuer: String::new(),
            algorithm: Algorithm::HS256,
            leeway: Duration::from_secs(DEFAULT_JWT_LEEWAY_SECS),
            require_expiry: true,
        }
    }
}

impl JwtConfig {
    /// Require and check the given issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self.verify_issuer = true;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Accept tokens that carry no `exp` claim.
    pub fn allow_missing_expiry(mut self) -> Self {
        self.require_expiry = false;
        self
    }

    /// Load from environment variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `JWT_ISSUER` | empty |
    /// | `JWT_VERIFY_ISSUER` | `true` when `JWT_ISSUER` is set |
    /// | `JWT_ALGORITHM` | `HS256` |
    /// | `JWT_LEEWAY_SECS` | `60` |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(issuer) = env_optional(JWT_ISSUER_ENV) {
            config = config.with_issuer(issuer);
        }

        if let Some(raw) = env_optional(JWT_VERIFY_ISSUER_ENV) {
            config.verify_issuer = crate::config::parse_flag(&raw);
        }

        if let Some(raw) = env_optional(JWT_ALGORITHM_ENV) {
            match Algorithm::from_str(&raw) {
                Ok(alg) => config.algorithm = alg,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "Unknown {JWT_ALGORITHM_ENV}, keeping {:?}",
                    config.algorithm
                ),
            }
        }

        if let Some(raw) = env_optional(JWT_LEEWAY_SECS_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) => config.leeway = Duration::from_secs(secs),
                Err(_) => tracing::warn!(
                    value = %raw,
                    "Invalid {JWT_LEEWAY_SECS_ENV}, keeping {}s",
                    config.leeway.as_secs()
                ),
            }
        }

        config
    }
}

/// Check that `token` has the shape of a signed token carrying [`Claims`].
///
/// The signature is NOT checked. Use this to reject garbage cheaply before
/// verification.
pub fn is_structurally_valid(token: &str) -> Result<(), TokenError> {
    decode_unverified(token).map(|_| ())
}

/// Read the `sub` claim without verifying the signature.
///
/// The result is not trustworthy. It is meant for logging and metrics before
/// verification; use [`TokenValidator::verify`] for anything that grants
/// access.
pub fn extract_subject_unverified(token: &str) -> Result<String, TokenError> {
    let data = decode_unverified(token)?;
    Ok(data.claims.subject().to_string())
}

fn decode_unverified(token: &str) -> Result<TokenData<Claims>, TokenError> {
    check_segments(token)?;
    jsonwebtoken::dangerous::insecure_decode::<Claims>(token)
        .map_err(|e| TokenError::Malformed(e.to_string()))
}

fn check_segments(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments[0].is_empty() || segments[1].is_empty() {
        return Err(TokenError::Malformed("empty header or payload".to_string()));
    }
    Ok(())
}

/// Verifies bearer tokens against a [`JwtConfig`].
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: JwtConfig,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: JwtConfig) -> Self {
        // Signature and algorithm only; claim checks run in `check_claims`
        // so their order is fixed here rather than by the library.
        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self { config, validation }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Decode and fully verify `token` with `key` at the current time.
    pub fn verify(&self, token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
        self.verify_at(token, key, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock (Unix seconds).
    pub fn verify_at(&self, token: &str, key: &DecodingKey, now: i64) -> Result<Claims, TokenError> {
        let result = self.verify_inner(token, key, now);
        if let Err(e) = &result {
            tracing::debug!(error_code = e.error_code(), "Token verification failed");
        }
        result
    }

    /// Verify with a raw HMAC secret, e.g. one resolved from a secret store.
    pub fn verify_with_secret(&self, token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
        self.verify(token, &DecodingKey::from_secret(secret))
    }

    fn verify_inner(&self, token: &str, key: &DecodingKey, now: i64) -> Result<Claims, TokenError> {
        check_segments(token)?;

        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if header.alg != self.config.algorithm {
            return Err(TokenError::AlgorithmMismatch {
                expected: format!("{:?}", self.config.algorithm),
                found: format!("{:?}", header.alg),
            });
        }

        let data = decode::<Claims>(token, key, &self.validation).map_err(TokenError::from_jwt)?;
        self.check_claims(&data.claims, now)?;

        Ok(data.claims)
    }

    fn check_claims(&self, claims: &Claims, now: i64) -> Result<(), TokenError> {
        if self.config.verify_issuer && claims.issuer() != Some(self.config.issuer.as_str()) {
            return Err(TokenError::InvalidIssuer(claims.issuer().map(str::to_string)));
        }

        let leeway = i64::try_from(self.config.leeway.as_secs()).unwrap_or(i64::MAX);

        match claims.expires_at() {
            Some(exp) if exp < now.saturating_sub(leeway) => return Err(TokenError::Expired),
            None if self.config.require_expiry => return Err(TokenError::MissingClaim("exp")),
            _ => {}
        }

        if let Some(nbf) = claims.not_before() {
            if nbf > now.saturating_add(leeway) {
                return Err(TokenError::NotYetValid);
            }
        }

        if let Some(iat) = claims.issued_at() {
            if iat > now.saturating_add(leeway) {
                return Err(TokenError::UsedBeforeIssued);
            }
        }

        Ok(())
    }
}
