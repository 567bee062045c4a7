// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `sky-trust` - verify a bearer token with the configured signing key.
//!
//! ```text
//! sky-trust <token>                 verify and print the trusted claims
//! sky-trust --unverified <token>    print the claimed subject (NOT verified)
//! ```
//!
//! The signing key is read through the secret backend selected from the
//! environment (see `sky_trust::config`).

use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use sky_trust::{
    config::{env_or_default, DEFAULT_JWT_SIGNING_KEY_SECRET, JWT_SIGNING_KEY_SECRET_ENV},
    extract_subject_unverified, is_structurally_valid,
    logtypes::LogEntry,
    select_backend,
    telemetry::{init_tracing, LogFormat},
    JwtConfig, SecretBackendConfig, SecretFetcher, TokenValidator,
};

const SERVICE_NAME: &str = "sky-trust";

/// Verify a bearer token with the signing key from the configured secret backend
#[derive(Parser, Debug)]
#[command(name = "sky-trust", version)]
struct Cli {
    /// Print the claimed subject without checking the signature (NOT trusted)
    #[arg(long)]
    unverified: bool,

    /// Compact JWT to check
    token: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(LogFormat::from_env()) {
        eprintln!("Failed to initialise logging: {e}");
    }

    let cli = Cli::parse();

    if cli.unverified {
        print_unverified_subject(&cli.token)
    } else {
        verify(&cli.token).await
    }
}

fn print_unverified_subject(token: &str) -> ExitCode {
    if let Err(e) = is_structurally_valid(token) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    match extract_subject_unverified(token) {
        Ok(subject) => {
            println!("{subject}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn verify(token: &str) -> ExitCode {
    // Selection failures are fatal: never fall back to another backend.
    let backend = match select_backend(&SecretBackendConfig::from_env()) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Failed to set up secret backend: {e}");
            return ExitCode::FAILURE;
        }
    };

    let secret_name = env_or_default(JWT_SIGNING_KEY_SECRET_ENV, DEFAULT_JWT_SIGNING_KEY_SECRET);
    let signing_key = match backend.get_secret(&secret_name).await {
        Ok(key) if !key.is_empty() => key,
        Ok(_) => {
            eprintln!("Signing key secret {secret_name} is empty or unset");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Failed to fetch signing key: {e}");
            return ExitCode::FAILURE;
        }
    };

    let validator = TokenValidator::new(JwtConfig::from_env());
    let result = validator.verify_with_secret(token, signing_key.as_bytes());

    let audit = match &result {
        Ok(claims) => LogEntry::new(SERVICE_NAME, "token-verification", "INFO", "token verified")
            .with_field("subject", json!(claims.subject()))
            .with_field("token_type", json!(claims.token_type())),
        Err(e) => LogEntry::new(SERVICE_NAME, "token-verification", "WARNING", "token rejected")
            .with_field("error_code", json!(e.error_code())),
    }
    .with_resource("global")
    .with_label("secret_backend", backend.name());

    match serde_json::to_string(&audit.into_data()) {
        Ok(line) => eprintln!("{line}"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode audit record"),
    }

    match result {
        Ok(claims) => match serde_json::to_string_pretty(&claims) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to encode claims: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(if e.is_malformed() { 65 } else { 77 })
        }
    }
}
