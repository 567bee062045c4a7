// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token parsing and verification errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Broad class of a [`TokenError`].
///
/// Malformed input and failed validation are kept apart so that callers can
/// answer with different status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// The string could not be decoded into a token carrying [`Claims`](super::Claims).
    Malformed,
    /// The token decoded but failed signature or claim validation.
    Validation,
}

/// Error returned by the token parsing and verification functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is malformed: {0}")]
    Malformed(String),

    #[error("Token algorithm {found} does not match configured algorithm {expected}")]
    AlgorithmMismatch { expected: String, found: String },

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token issuer is invalid: {0:?}")]
    InvalidIssuer(Option<String>),

    #[error("Token is missing required claim `{0}`")]
    MissingClaim(&'static str),

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token was used before it was issued")]
    UsedBeforeIssued,

    #[error("Verification key is unusable: {0}")]
    InvalidKey(String),
}

#[derive(Serialize)]
struct TokenErrorBody {
    error: String,
    error_code: String,
}

impl TokenError {
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            TokenError::Malformed(_) => TokenErrorKind::Malformed,
            _ => TokenErrorKind::Validation,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == TokenErrorKind::Malformed
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed_token",
            TokenError::AlgorithmMismatch { .. } => "algorithm_mismatch",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::InvalidIssuer(_) => "invalid_issuer",
            TokenError::MissingClaim(_) => "missing_claim",
            TokenError::Expired => "token_expired",
            TokenError::NotYetValid => "token_not_yet_valid",
            TokenError::UsedBeforeIssued => "token_used_before_issued",
            TokenError::InvalidKey(_) => "invalid_key",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// A key the server cannot use is a server fault, not the caller's.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TokenError::Malformed(_) => StatusCode::BAD_REQUEST,
            TokenError::InvalidKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Map a `jsonwebtoken` decode failure onto the crate's taxonomy.
    ///
    /// Temporal and issuer checks are done by the validator itself, so only
    /// signature and key failures are expected here.
    pub(crate) fn from_jwt(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey => TokenError::InvalidKey(err.to_string()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(TokenErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
