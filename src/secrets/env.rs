// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Environment variable secret backend.

use super::{SecretError, SecretFetcher};

/// Reads secrets straight from the process environment.
///
/// The environment has no separate "not found" signal: an unset variable (or
/// one that is not valid unicode) yields an empty string, not an error.
/// Callers must treat an empty value as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretFetcher;

impl EnvSecretFetcher {
    pub fn new() -> Self {
        Self
    }

    fn read(name: &str) -> String {
        // Such names can never be set; don't hand them to the platform.
        if name.is_empty() || name.contains(['=', '\0']) {
            return String::new();
        }
        std::env::var(name).unwrap_or_default()
    }
}

impl SecretFetcher for EnvSecretFetcher {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let value = Self::read(name);
        if value.is_empty() {
            tracing::debug!(secret = %name, "Secret not set in environment");
        }
        Ok(value)
    }
}
