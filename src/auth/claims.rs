// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims carried by bearer tokens.

use serde::{Deserialize, Deserializer, Serialize};

/// `type` value carried by access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";
/// `type` value carried by refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Claims decoded from a bearer token.
///
/// The registered claims (`iss`, `sub`, `aud`, `exp`, `iat`, `nbf`, `jti`) are
/// all optional on the wire; presence requirements are enforced by the
/// validator, not by deserialization. `aud` accepts either a single string or
/// an array of strings.
///
/// Claims are read-only once decoded. Whether a value can be trusted depends
/// on how it was obtained: only [`TokenValidator::verify`](super::TokenValidator::verify)
/// yields verified claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    aud: Vec<String>,

    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    exp: Option<i64>,

    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    iat: Option<i64>,

    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    email: String,

    #[serde(default, deserialize_with = "null_as_default")]
    roles: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    permissions: Vec<String>,

    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    token_type: String,
}

impl Claims {
    /// Caller identity (`sub`), or an empty string when absent.
    pub fn subject(&self) -> &str {
        self.sub.as_deref().unwrap_or_default()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref()
    }

    pub fn audience(&self) -> &[String] {
        &self.aud
    }

    /// Expiry as a Unix timestamp (seconds).
    pub fn expires_at(&self) -> Option<i64> {
        self.exp
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.iat
    }

    pub fn not_before(&self) -> Option<i64> {
        self.nbf
    }

    pub fn token_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Token kind discriminator (`type` claim), e.g. `access` or `refresh`.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Check if the claims carry the given role (exact match).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the claims carry the given permission (exact match).
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type == ACCESS_TOKEN_TYPE
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type == REFRESH_TOKEN_TYPE
    }
}

/// Issuers that serialize nil lists write `null`; read it as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(aud)) => aud,
        None => Vec::new(),
    })
}

/// NumericDate per RFC 7519: seconds since the epoch, possibly fractional.
/// Fractions are truncated.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(secs) = number.as_i64() {
        return Ok(Some(secs));
    }

    match number.as_f64() {
        Some(secs) if secs.is_finite() && secs.abs() < i64::MAX as f64 => Ok(Some(secs as i64)),
        _ => Err(serde::de::Error::custom(format!(
            "numeric date out of range: {number}"
        ))),
    }
}
