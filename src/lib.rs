// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sky Trust - Token Validation & Secret Resolution
//!
//! Trust primitives shared by backend services: bearer token (JWT) claims
//! parsing and verification, and secret fetching that does not care which
//! store holds the secret.
//!
//! The two halves are independent; a host typically resolves the signing key
//! through `secrets` and hands it to `auth`.
//!
//! ## Modules
//!
//! - `auth` - Claims model, token validator, axum integration
//! - `secrets` - `SecretFetcher` trait, environment and Secret Manager backends
//! - `config` - Environment variable names and defaults
//! - `telemetry` - Tracing subscriber setup
//! - `logtypes` - Structured audit log records

pub mod auth;
pub mod config;
pub mod logtypes;
pub mod secrets;
pub mod telemetry;

pub use auth::{
    extract_subject_unverified, is_structurally_valid, Claims, JwtConfig, TokenError,
    TokenErrorKind, TokenValidator,
};
pub use secrets::{
    select_backend, SecretBackend, SecretBackendConfig, SecretError, SecretFetcher,
};
