// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup-time choice of secret backend.

use std::path::PathBuf;

use super::{EnvSecretFetcher, GcpSecretManagerFetcher, SecretBackend, SecretError};
use crate::config::{
    env_optional, parse_flag, GCP_CREDENTIALS_FILE_ENV, GCP_PROJECT_ID_ENV,
    SECRET_MANAGER_ENDPOINT_ENV, USE_SECRET_MANAGER_ENV,
};

/// Inputs to [`select_backend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretBackendConfig {
    /// Use Secret Manager instead of environment variables.
    pub use_secret_manager: bool,
    pub project_id: Option<String>,
    pub credentials_file: Option<PathBuf>,
    /// Secret Manager API base URL override.
    pub endpoint: Option<String>,
}

impl SecretBackendConfig {
    /// Environment-variable backend.
    pub fn env() -> Self {
        Self::default()
    }

    /// Secret Manager backend for `project_id` using the given key file.
    pub fn secret_manager(project_id: impl Into<String>, credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            use_secret_manager: true,
            project_id: Some(project_id.into()),
            credentials_file: Some(credentials_file.into()),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Read `USE_SECRET_MANAGER`, `GCP_PROJECT_ID`,
    /// `GOOGLE_APPLICATION_CREDENTIALS` and `SECRET_MANAGER_ENDPOINT`.
    pub fn from_env() -> Self {
        Self {
            use_secret_manager: env_optional(USE_SECRET_MANAGER_ENV)
                .is_some_and(|v| parse_flag(&v)),
            project_id: env_optional(GCP_PROJECT_ID_ENV),
            credentials_file: env_optional(GCP_CREDENTIALS_FILE_ENV).map(PathBuf::from),
            endpoint: env_optional(SECRET_MANAGER_ENDPOINT_ENV),
        }
    }
}

/// Build the secret backend described by `config`.
///
/// Call once at startup and reuse the result. When Secret Manager is requested
/// but cannot be constructed the error is returned; there is no fallback to
/// environment variables.
pub fn select_backend(config: &SecretBackendConfig) -> Result<SecretBackend, SecretError> {
    if !config.use_secret_manager {
        tracing::info!(backend = "env", "Using environment variables for secrets");
        return Ok(SecretBackend::Env(EnvSecretFetcher::new()));
    }

    build_secret_manager(config)
        .map(|fetcher| {
            tracing::info!(
                backend = "gcp_secret_manager",
                project_id = %fetcher.project_id(),
                endpoint = %fetcher.endpoint(),
                "Using Secret Manager for secrets"
            );
            SecretBackend::SecretManager(fetcher)
        })
        .inspect_err(|e| {
            tracing::error!(error = %e, "Failed to set up Secret Manager backend");
        })
}

fn build_secret_manager(config: &SecretBackendConfig) -> Result<GcpSecretManagerFetcher, SecretError> {
    let project_id = config
        .project_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| SecretError::MissingConfig(GCP_PROJECT_ID_ENV.to_string()))?;
    let credentials_file = config
        .credentials_file
        .as_ref()
        .ok_or_else(|| SecretError::MissingConfig(GCP_CREDENTIALS_FILE_ENV.to_string()))?;

    let fetcher = GcpSecretManagerFetcher::new(project_id, credentials_file)?;
    match &config.endpoint {
        Some(endpoint) => fetcher.with_endpoint(endpoint),
        None => Ok(fetcher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::gcp::testing::{credentials_file, loopback_client, spawn};
    use crate::secrets::SecretFetcher;

    #[test]
    fn flag_off_selects_env_backend() {
        let backend = select_backend(&SecretBackendConfig::env()).unwrap();
        assert!(matches!(backend, SecretBackend::Env(_)));
    }

    #[test]
    fn flag_off_ignores_secret_manager_settings() {
        let config = SecretBackendConfig {
            use_secret_manager: false,
            project_id: Some("p".to_string()),
            credentials_file: Some("/nonexistent.json".into()),
            endpoint: None,
        };
        let backend = select_backend(&config).unwrap();
        assert_eq!(backend.name(), "env");
    }

    #[test]
    fn missing_project_id_is_an_error_not_a_fallback() {
        let config = SecretBackendConfig {
            use_secret_manager: true,
            project_id: None,
            credentials_file: Some("/tmp/creds.json".into()),
            endpoint: None,
        };
        let err = select_backend(&config).unwrap_err();
        assert!(matches!(err, SecretError::MissingConfig(ref v) if v == GCP_PROJECT_ID_ENV));
    }

    #[test]
    fn missing_credentials_path_is_an_error() {
        let config = SecretBackendConfig {
            use_secret_manager: true,
            project_id: Some("p".to_string()),
            credentials_file: None,
            endpoint: None,
        };
        let err = select_backend(&config).unwrap_err();
        assert!(matches!(err, SecretError::MissingConfig(ref v) if v == GCP_CREDENTIALS_FILE_ENV));
    }

    #[test]
    fn unreadable_credentials_propagate_construction_error() {
        let config = SecretBackendConfig::secret_manager("p", "/nonexistent/creds.json");
        let err = select_backend(&config).unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn invalid_endpoint_propagates_construction_error() {
        let (_dir, path) = credentials_file("https://oauth2.googleapis.com/token");
        let config = SecretBackendConfig::secret_manager("p", &path).with_endpoint("::nope::");
        let err = select_backend(&config).unwrap_err();
        assert!(matches!(err, SecretError::Construction(_)));
    }

    #[tokio::test]
    async fn flag_on_selects_network_backend() {
        let server = spawn(&[("API_KEY", "from-secret-manager")]).await;
        let (_dir, path) = credentials_file(&format!("{}/token", server.base_url));
        let config = SecretBackendConfig::secret_manager("sky-test", &path)
            .with_endpoint(server.base_url.clone());

        let backend = select_backend(&config).unwrap();
        let SecretBackend::SecretManager(fetcher) = backend else {
            panic!("expected Secret Manager backend");
        };
        assert_eq!(fetcher.project_id(), "sky-test");

        let backend = SecretBackend::SecretManager(fetcher.with_http_client(loopback_client()));
        let value = backend.get_secret("API_KEY").await.unwrap();
        assert_eq!(value, "from-secret-manager");
        assert_eq!(server.secret_requests(), 1);
    }

    #[tokio::test]
    async fn env_backend_makes_no_network_calls() {
        let server = spawn(&[("API_KEY", "from-secret-manager")]).await;
        let config = SecretBackendConfig {
            endpoint: Some(server.base_url.clone()),
            ..SecretBackendConfig::env()
        };

        let backend = select_backend(&config).unwrap();
        let value = backend.get_secret("SKY_TRUST_TEST_SELECT_UNSET").await.unwrap();
        assert_eq!(value, "");
        assert_eq!(server.token_requests(), 0);
        assert_eq!(server.secret_requests(), 0);
    }

    #[test]
    fn from_env_reads_flag_and_settings() {
        std::env::set_var(USE_SECRET_MANAGER_ENV, "TRUE");
        std::env::set_var(GCP_PROJECT_ID_ENV, "sky-prod");
        std::env::set_var(GCP_CREDENTIALS_FILE_ENV, "/etc/sky/sa.json");

        let config = SecretBackendConfig::from_env();

        std::env::remove_var(USE_SECRET_MANAGER_ENV);
        std::env::remove_var(GCP_PROJECT_ID_ENV);
        std::env::remove_var(GCP_CREDENTIALS_FILE_ENV);

        assert!(config.use_secret_manager);
        assert_eq!(config.project_id.as_deref(), Some("sky-prod"));
        assert_eq!(
            config.credentials_file,
            Some(PathBuf::from("/etc/sky/sa.json"))
        );
    }
}
