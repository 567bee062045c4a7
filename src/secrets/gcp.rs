// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google Cloud Secret Manager backend.
//!
//! Each fetch:
//!
//! 1. Signs a JWT assertion with the service account key and exchanges it for
//!    an OAuth2 access token (`urn:ietf:params:oauth:grant-type:jwt-bearer`)
//! 2. Calls `GET /v1/projects/{project}/secrets/{name}/versions/latest:access`
//! 3. Base64-decodes `payload.data`
//!
//! Neither the access token nor the secret value is cached.

use std::{fmt, fs, path::Path, time::Duration};

use base64ct::{Base64, Encoding};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{SecretError, SecretFetcher};

pub const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Upstream error bodies are cut to this many bytes before they reach errors
/// and logs.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// The fields of a service account key file this backend needs.
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    key_type: String,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    #[serde(default)]
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// Fetches secrets from Google Cloud Secret Manager.
///
/// Cheap to clone; clones share the HTTP connection pool and are safe to use
/// concurrently.
#[derive(Clone)]
pub struct GcpSecretManagerFetcher {
    project_id: String,
    endpoint: String,
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    http: Client,
}

impl fmt::Debug for GcpSecretManagerFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpSecretManagerFetcher")
            .field("project_id", &self.project_id)
            .field("endpoint", &self.endpoint)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl GcpSecretManagerFetcher {
    /// Create a fetcher for `project_id` authenticated by the service account
    /// key at `credentials_file`.
    ///
    /// Fails if the project id is blank, the file cannot be read, or it does
    /// not hold a usable service account key.
    pub fn new(
        project_id: impl Into<String>,
        credentials_file: impl AsRef<Path>,
    ) -> Result<Self, SecretError> {
        let project_id = project_id.into().trim().to_string();
        if project_id.is_empty() {
            return Err(SecretError::MissingConfig("project id".to_string()));
        }

        let path = credentials_file.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            SecretError::Construction(format!("failed to read {}: {e}", path.display()))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| SecretError::Credentials(format!("{}: {e}", path.display())))?;

        if key.key_type != "service_account" {
            return Err(SecretError::Credentials(format!(
                "expected a service_account key, found {:?}",
                key.key_type
            )));
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SecretError::Credentials(format!("invalid private key: {e}")))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SecretError::Construction(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            project_id,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_email: key.client_email,
            token_uri: key.token_uri,
            key_id: key.private_key_id,
            signing_key,
            http,
        })
    }

    /// Point the fetcher at a different Secret Manager API base URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, SecretError> {
        let url = Url::parse(endpoint)
            .map_err(|e| SecretError::Construction(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SecretError::Construction(format!(
                "unsupported endpoint scheme {:?}",
                url.scheme()
            )));
        }
        self.endpoint = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Use a caller-provided HTTP client (proxy, TLS or timeout settings).
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resource name of the latest version of `secret_id`.
    pub fn resource_name(&self, secret_id: &str) -> String {
        format!(
            "projects/{}/secrets/{}/versions/latest",
            self.project_id, secret_id
        )
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        let assertion = encode(&header, &claims, &self.signing_key)
            .map_err(|e| SecretError::Authentication(format!("failed to sign assertion: {e}")))?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SecretError::Transport(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = truncate_body(response.text().await.unwrap_or_default());
            return Err(SecretError::Authentication(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token_response: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| SecretError::Authentication(format!("invalid token response: {e}")))?;

        if token_response.access_token.trim().is_empty() {
            return Err(SecretError::Authentication(
                "token response did not include access_token".to_string(),
            ));
        }

        Ok(token_response.access_token)
    }

    async fn access_latest(&self, secret_id: &str) -> Result<String, SecretError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/{}:access", self.endpoint, self.resource_name(secret_id));

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SecretError::Transport(format!("GET {secret_id} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound {
                name: secret_id.to_string(),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SecretError::PermissionDenied {
                name: secret_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = truncate_body(response.text().await.unwrap_or_default());
            return Err(SecretError::Status {
                name: secret_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| SecretError::InvalidResponse(format!("invalid JSON: {e}")))?;

        let data = body
            .payload
            .ok_or_else(|| SecretError::InvalidResponse("missing payload".to_string()))?
            .data;

        let bytes = Base64::decode_vec(&data)
            .map_err(|e| SecretError::InvalidResponse(format!("payload is not base64: {e}")))?;

        String::from_utf8(bytes)
            .map_err(|_| SecretError::InvalidResponse("payload is not valid UTF-8".to_string()))
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

/// Secret ids become a path segment, so they must be non-empty and slash-free.
fn validate_secret_id(secret_id: &str) -> Result<(), SecretError> {
    if secret_id.is_empty() || secret_id.contains(['/', '?', '#']) {
        return Err(SecretError::InvalidName(secret_id.to_string()));
    }
    Ok(())
}

impl SecretFetcher for GcpSecretManagerFetcher {
    async fn get_secret(&self, secret_id: &str) -> Result<String, SecretError> {
        validate_secret_id(secret_id)?;

        match self.access_latest(secret_id).await {
            Ok(value) => {
                tracing::debug!(
                    secret = %secret_id,
                    project_id = %self.project_id,
                    "Fetched secret from Secret Manager"
                );
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(
                    secret = %secret_id,
                    project_id = %self.project_id,
                    error = %e,
                    "Failed to access secret version"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Local stand-in for the OAuth2 token endpoint and Secret Manager API.

    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Form, State},
        http::{header::AUTHORIZATION, HeaderMap, StatusCode, Uri},
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use base64ct::{Base64, Encoding};
    use serde_json::json;
    use tempfile::TempDir;

    pub const TEST_PRIVATE_KEY: &str = include_str!("testdata/test_rsa_key.pem");
    pub const FAKE_ACCESS_TOKEN: &str = "ya29.fake-access-token";

    #[derive(Clone)]
    struct FakeState {
        secrets: Arc<HashMap<String, String>>,
        token_requests: Arc<AtomicUsize>,
        secret_requests: Arc<AtomicUsize>,
    }

    pub struct FakeSecretManager {
        pub base_url: String,
        token_requests: Arc<AtomicUsize>,
        secret_requests: Arc<AtomicUsize>,
    }

    impl FakeSecretManager {
        pub fn token_requests(&self) -> usize {
            self.token_requests.load(Ordering::SeqCst)
        }

        pub fn secret_requests(&self) -> usize {
            self.secret_requests.load(Ordering::SeqCst)
        }
    }

    async fn token(
        State(state): State<FakeState>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        state.token_requests.fetch_add(1, Ordering::SeqCst);
        let grant_ok = form.get("grant_type").map(String::as_str)
            == Some("urn:ietf:params:oauth:grant-type:jwt-bearer");
        let assertion_ok = form
            .get("assertion")
            .is_some_and(|a| a.split('.').count() == 3);

        if !(grant_ok && assertion_ok) {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })))
                .into_response();
        }
        Json(json!({
            "access_token": FAKE_ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3599
        }))
        .into_response()
    }

    async fn access(State(state): State<FakeState>, headers: HeaderMap, uri: Uri) -> Response {
        state.secret_requests.fetch_add(1, Ordering::SeqCst);

        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(format!("Bearer {FAKE_ACCESS_TOKEN}").as_str());
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }

        let Some(resource) = uri
            .path()
            .strip_prefix("/v1/")
            .and_then(|p| p.strip_suffix(":access"))
        else {
            return StatusCode::NOT_FOUND.into_response();
        };

        // projects/{p}/secrets/{s}/versions/latest
        let parts: Vec<&str> = resource.split('/').collect();
        match parts.as_slice() {
            ["projects", "sky-test", "secrets", "FORBIDDEN", "versions", "latest"] => {
                StatusCode::FORBIDDEN.into_response()
            }
            ["projects", "sky-test", "secrets", "BROKEN", "versions", "latest"] => {
                (StatusCode::BAD_GATEWAY, "x".repeat(8 * 1024)).into_response()
            }
            ["projects", "sky-test", "secrets", name, "versions", "latest"] => {
                match state.secrets.get(*name) {
                    Some(value) => Json(json!({
                        "name": resource,
                        "payload": { "data": Base64::encode_string(value.as_bytes()) }
                    }))
                    .into_response(),
                    None => StatusCode::NOT_FOUND.into_response(),
                }
            }
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Serve the fake API on an ephemeral loopback port.
    pub async fn spawn(secrets: &[(&str, &str)]) -> FakeSecretManager {
        let state = FakeState {
            secrets: Arc::new(
                secrets
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            token_requests: Arc::new(AtomicUsize::new(0)),
            secret_requests: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/token", post(token))
            .fallback(access)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeSecretManager {
            base_url: format!("http://{addr}"),
            token_requests: state.token_requests,
            secret_requests: state.secret_requests,
        }
    }

    /// Write a service account key file whose token endpoint is `token_uri`.
    pub fn credentials_file(token_uri: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("service-account.json");
        let key = json!({
            "type": "service_account",
            "project_id": "sky-test",
            "private_key_id": "test-key-1",
            "private_key": TEST_PRIVATE_KEY,
            "client_email": "secrets-reader@sky-test.iam.gserviceaccount.com",
            "client_id": "1234567890",
            "token_uri": token_uri
        });
        std::fs::write(&path, key.to_string()).expect("Failed to write credentials");
        (dir, path)
    }

    /// Client that ignores proxy settings so loopback requests stay local.
    pub fn loopback_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }
}
