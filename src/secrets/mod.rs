// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Secret Resolution
//!
//! Fetching a secret is backend-agnostic: callers depend on
//! [`SecretFetcher`] and never on which store is active.
//!
//! ## Backends
//!
//! - [`EnvSecretFetcher`] - process environment (local development)
//! - [`GcpSecretManagerFetcher`] - Google Cloud Secret Manager (production)
//!
//! The backend is chosen once at startup by [`select_backend`]. There is no
//! per-call reselection and no fallback from one backend to another.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let fetcher = select_backend(&SecretBackendConfig::from_env())?;
//! let api_key = fetcher.get_secret("API_KEY").await?;
//! ```
//!
//! Nothing is cached: every call reads the environment or hits the network.

use std::future::Future;
use std::sync::Arc;

pub mod env;
pub mod gcp;
pub mod select;

pub use env::EnvSecretFetcher;
pub use gcp::GcpSecretManagerFetcher;
pub use select::{select_backend, SecretBackendConfig};

/// Capability to fetch a named secret.
pub trait SecretFetcher: Send + Sync {
    /// Return the current value of the secret called `name`.
    fn get_secret(&self, name: &str) -> impl Future<Output = Result<String, SecretError>> + Send;
}

impl<T: SecretFetcher> SecretFetcher for Arc<T> {
    fn get_secret(&self, name: &str) -> impl Future<Output = Result<String, SecretError>> + Send {
        (**self).get_secret(name)
    }
}

/// Secret backend errors.
///
/// An unset environment variable is not an error; see [`EnvSecretFetcher`].
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret backend configuration missing: {0}")]
    MissingConfig(String),

    #[error("Failed to set up secret manager client: {0}")]
    Construction(String),

    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Invalid secret name: {0:?}")]
    InvalidName(String),

    #[error("Secret manager authentication failed: {0}")]
    Authentication(String),

    #[error("Secret {name} not found")]
    NotFound { name: String },

    #[error("Access to secret {name} denied")]
    PermissionDenied { name: String },

    #[error("Secret manager request failed: {0}")]
    Transport(String),

    #[error("Secret manager returned {status} for {name}: {body}")]
    Status {
        name: String,
        status: u16,
        body: String,
    },

    #[error("Secret manager response was invalid: {0}")]
    InvalidResponse(String),
}

impl SecretError {
    /// Whether the failure happened while building a backend rather than
    /// while fetching from one.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            SecretError::MissingConfig(_) | SecretError::Construction(_) | SecretError::Credentials(_)
        )
    }
}

/// The closed set of secret backends.
#[derive(Debug, Clone)]
pub enum SecretBackend {
    Env(EnvSecretFetcher),
    SecretManager(GcpSecretManagerFetcher),
}

impl SecretBackend {
    /// Short backend name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SecretBackend::Env(_) => "env",
            SecretBackend::SecretManager(_) => "gcp_secret_manager",
        }
    }
}

impl SecretFetcher for SecretBackend {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        match self {
            SecretBackend::Env(fetcher) => fetcher.get_secret(name).await,
            SecretBackend::SecretManager(fetcher) => fetcher.get_secret(name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory fetcher standing in for a real backend.
    struct FakeFetcher {
        values: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl SecretFetcher for FakeFetcher {
        async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.values
                .get(name)
                .cloned()
                .ok_or_else(|| SecretError::NotFound {
                    name: name.to_string(),
                })
        }
    }

    async fn signing_key<F: SecretFetcher>(fetcher: &F) -> Result<String, SecretError> {
        fetcher.get_secret("JWT_SIGNING_KEY").await
    }

    #[tokio::test]
    async fn callers_can_use_injected_fetchers() {
        let fake = Arc::new(FakeFetcher {
            values: HashMap::from([("JWT_SIGNING_KEY".to_string(), "k1".to_string())]),
            calls: AtomicUsize::new(0),
        });

        assert_eq!(signing_key(&fake).await.unwrap(), "k1");
        assert_eq!(signing_key(&fake).await.unwrap(), "k1");
        // No caching: each call reaches the backend.
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);

        let err = fake.get_secret("MISSING").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound { .. }));
    }

    #[tokio::test]
    async fn env_backend_delegates() {
        let backend = SecretBackend::Env(EnvSecretFetcher::new());
        assert_eq!(backend.name(), "env");
        assert_eq!(
            backend
                .get_secret("SKY_TRUST_TEST_DEFINITELY_UNSET")
                .await
                .unwrap(),
            ""
        );
    }

    #[test]
    fn construction_errors_are_classified() {
        assert!(SecretError::MissingConfig("GCP_PROJECT_ID".into()).is_construction());
        assert!(SecretError::Credentials("bad key".into()).is_construction());
        assert!(!SecretError::NotFound { name: "x".into() }.is_construction());
    }
}
