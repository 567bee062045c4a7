// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! by the host wiring. The token validator and the Secret Manager client take
//! their settings as values; the `from_env` loaders read these variables once
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `USE_SECRET_MANAGER` | Fetch secrets from GCP Secret Manager (`true`/`1`/`yes`/`on`) | `false` |
//! | `GCP_PROJECT_ID` | Project owning the secrets | Required with Secret Manager |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | Service account key file | Required with Secret Manager |
//! | `SECRET_MANAGER_ENDPOINT` | Secret Manager API base URL | `https://secretmanager.googleapis.com` |
//! | `JWT_SIGNING_KEY_SECRET` | Name of the secret holding the JWT signing key | `JWT_SIGNING_KEY` |
//! | `JWT_ISSUER` | Expected JWT issuer claim | Optional |
//! | `JWT_VERIFY_ISSUER` | Enforce the issuer check | `true` if `JWT_ISSUER` set |
//! | `JWT_ALGORITHM` | Accepted signing algorithm | `HS256` |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance in seconds | `60` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

/// Boolean-like flag selecting the Secret Manager backend.
pub const USE_SECRET_MANAGER_ENV: &str = "USE_SECRET_MANAGER";

/// GCP project identifier used to build secret resource names.
pub const GCP_PROJECT_ID_ENV: &str = "GCP_PROJECT_ID";

/// Path to the service account JSON key file.
pub const GCP_CREDENTIALS_FILE_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Override for the Secret Manager API base URL.
pub const SECRET_MANAGER_ENDPOINT_ENV: &str = "SECRET_MANAGER_ENDPOINT";

/// Name of the secret that holds the JWT signing key.
pub const JWT_SIGNING_KEY_SECRET_ENV: &str = "JWT_SIGNING_KEY_SECRET";

/// Default secret name for the JWT signing key.
pub const DEFAULT_JWT_SIGNING_KEY_SECRET: &str = "JWT_SIGNING_KEY";

pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_VERIFY_ISSUER_ENV: &str = "JWT_VERIFY_ISSUER";
pub const JWT_ALGORITHM_ENV: &str = "JWT_ALGORITHM";
pub const JWT_LEEWAY_SECS_ENV: &str = "JWT_LEEWAY_SECS";

/// Clock skew tolerance (60 seconds).
pub const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

/// Logging format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Read an environment variable, treating unset and blank values alike.
pub fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

/// Interpret a boolean-like configuration value.
///
/// `true`, `1`, `yes` and `on` (any case) are true; anything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
