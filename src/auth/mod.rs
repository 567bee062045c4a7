// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token (JWT) claims model and validation.
//!
//! ## Read Paths
//!
//! - `is_structurally_valid` / `extract_subject_unverified`: decode without
//!   checking the signature (fast rejection, logging)
//! - `TokenValidator::verify`: signature, algorithm, issuer and time checks;
//!   the only source of trusted claims
//!
//! ## Security
//!
//! - The accepted algorithm is fixed by configuration, never by the token
//! - Clock skew tolerance defaults to 60 seconds
//! - Signing keys are supplied by the host (see `crate::secrets`)

pub mod claims;
pub mod error;
pub mod middleware;
pub mod validator;

pub use claims::{Claims, ACCESS_TOKEN_TYPE, REFRESH_TOKEN_TYPE};
pub use error::{TokenError, TokenErrorKind};
pub use middleware::{require_bearer, AuthRejection, AuthState, Authenticated, BearerToken};
pub use validator::{extract_subject_unverified, is_structurally_valid, JwtConfig, TokenValidator};
