// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum integration for bearer token authentication.
//!
//! [`require_bearer`] verifies the `Authorization: Bearer <token>` header and
//! stores the trusted [`Claims`] and the raw [`BearerToken`] in the request
//! extensions. Handlers read them back with the [`Authenticated`] extractor,
//! which also verifies on its own when the middleware is not installed.
//!
//! ```rust,ignore
//! let auth = AuthState::from_secret(TokenValidator::new(config), &signing_key);
//!
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(auth.clone(), require_bearer))
//!     .with_state(auth);
//!
//! async fn me(Authenticated(claims): Authenticated) -> String {
//!     claims.subject().to_string()
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::DecodingKey;
use serde::Serialize;

use super::{extract_subject_unverified, Claims, TokenError, TokenValidator};

/// Validator and key shared by the middleware and extractor.
#[derive(Clone)]
pub struct AuthState {
    validator: Arc<TokenValidator>,
    key: Arc<DecodingKey>,
}

impl AuthState {
    pub fn new(validator: TokenValidator, key: DecodingKey) -> Self {
        Self {
            validator: Arc::new(validator),
            key: Arc::new(key),
        }
    }

    /// Build with an HMAC signing secret.
    pub fn from_secret(validator: TokenValidator, secret: &[u8]) -> Self {
        Self::new(validator, DecodingKey::from_secret(secret))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.validator.verify(token, &self.key)
    }
}

/// The raw bearer token of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

/// Why a request was not authenticated.
#[derive(Debug, thiserror::Error)]
pub enum AuthRejection {
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Serialize)]
struct AuthRejectionBody {
    error: String,
    error_code: String,
}

impl AuthRejection {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthRejection::MissingAuthHeader => "missing_auth_header",
            AuthRejection::InvalidAuthHeader => "invalid_auth_header",
            AuthRejection::Token(e) => e.error_code(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthRejection::MissingAuthHeader | AuthRejection::InvalidAuthHeader => {
                StatusCode::UNAUTHORIZED
            }
            AuthRejection::Token(e) => e.status_code(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthRejectionBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthRejection::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthRejection::InvalidAuthHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthRejection::InvalidAuthHeader)?;

    if token.is_empty() {
        return Err(AuthRejection::InvalidAuthHeader);
    }
    Ok(token)
}

fn authenticate(headers: &HeaderMap, state: &AuthState) -> Result<(Claims, BearerToken), AuthRejection> {
    let token = bearer_token(headers)?;

    match state.verify(token) {
        Ok(claims) => Ok((claims, BearerToken(token.to_string()))),
        Err(e) => {
            // Unverified, for the log line only.
            let claimed_subject = extract_subject_unverified(token).ok();
            tracing::warn!(
                claimed_subject = ?claimed_subject,
                error_code = e.error_code(),
                "Rejected bearer token"
            );
            Err(e.into())
        }
    }
}

/// Authentication middleware function.
pub async fn require_bearer(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &state) {
        Ok((claims, token)) => {
            request.extensions_mut().insert(claims);
            request.extensions_mut().insert(token);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extractor for verified claims.
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // First check if middleware already verified the request
        if let Some(claims) = parts.extensions.get::<Claims>().cloned() {
            return Ok(Authenticated(claims));
        }

        let auth = AuthState::from_ref(state);
        let (claims, token) = authenticate(&parts.headers, &auth)?;
        parts.extensions.insert(claims.clone());
        parts.extensions.insert(token);

        Ok(Authenticated(claims))
    }
}
