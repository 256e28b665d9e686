//! Authentication protocol variants.
//!
//! Each variant describes how to ask the identity endpoint for a token and
//! how to read the token and its expiry back out of the answer. Nothing in
//! here performs I/O.

use crate::credentials::{Credentials, ProjectScope};
use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::{json, Value};
use std::fmt;

pub const HEADER_AUTH_USER: &str = "X-Auth-User";
pub const HEADER_AUTH_KEY: &str = "X-Auth-Key";
pub const HEADER_AUTH_TOKEN: &str = "x-auth-token";
pub const HEADER_EXPIRE_AUTH_TOKEN: &str = "x-expire-auth-token";
pub const HEADER_SUBJECT_TOKEN: &str = "x-subject-token";

/// Authentication handshake supported by the storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthProtocol {
    /// Legacy Swift key auth (`/auth/v1.0`)
    V1,
    /// Keystone v2 tenant auth (`/v2.0/tokens`)
    V2,
    /// Keystone v3 identity auth (`/v3/auth/tokens`)
    #[default]
    V3,
}

/// Shape of the authentication request for one variant
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    pub path: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

/// Token obtained from a successful exchange
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthProtocol {
    /// Map the numeric protocol selector (1, 2 or 3)
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(AuthProtocol::V1),
            2 => Some(AuthProtocol::V2),
            3 => Some(AuthProtocol::V3),
            _ => None,
        }
    }

    /// Path of the identity endpoint, relative to the auth host
    pub fn path(&self) -> &'static str {
        match self {
            AuthProtocol::V1 => "/auth/v1.0",
            AuthProtocol::V2 => "/v2.0/tokens",
            AuthProtocol::V3 => "/v3/auth/tokens",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            AuthProtocol::V1 => Method::GET,
            AuthProtocol::V2 | AuthProtocol::V3 => Method::POST,
        }
    }

    /// Describe the authentication request for these credentials
    pub fn request(&self, credentials: &Credentials) -> AuthRequest {
        let (headers, body) = match self {
            AuthProtocol::V1 => (
                vec![
                    (HEADER_AUTH_USER, credentials.user().to_string()),
                    (HEADER_AUTH_KEY, credentials.password().to_string()),
                ],
                None,
            ),
            AuthProtocol::V2 => (Vec::new(), Some(v2_body(credentials))),
            AuthProtocol::V3 => (Vec::new(), Some(v3_body(credentials))),
        };

        AuthRequest {
            method: self.method(),
            path: self.path(),
            headers,
            body,
        }
    }

    /// Read the token and its absolute expiry out of an authentication response
    pub fn extract(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        match self {
            AuthProtocol::V1 => {
                let token = header_str(headers, HEADER_AUTH_TOKEN)?;
                let raw = header_str(headers, HEADER_EXPIRE_AUTH_TOKEN)?;
                let invalid = || AuthError::InvalidExpiry {
                    field: HEADER_EXPIRE_AUTH_TOKEN,
                    value: raw.to_string(),
                };
                // Lifetime in seconds; must be non-negative and land in chrono's range.
                let expires_at = raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|seconds| *seconds >= 0)
                    .and_then(Duration::try_seconds)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(invalid)?;

                Ok(IssuedToken {
                    token: token.to_string(),
                    expires_at,
                })
            }
            AuthProtocol::V2 => {
                let body: Value = serde_json::from_slice(body)?;
                let token = json_str(&body, "/access/token/id", "access.token.id")?;
                let expires =
                    json_str(&body, "/access/token/expires", "access.token.expires")?;

                Ok(IssuedToken {
                    token: token.to_string(),
                    expires_at: parse_timestamp("access.token.expires", expires)?,
                })
            }
            AuthProtocol::V3 => {
                let token = header_str(headers, HEADER_SUBJECT_TOKEN)?;
                let body: Value = serde_json::from_slice(body)?;
                let expires = json_str(&body, "/token/expires_at", "token.expires_at")?;

                Ok(IssuedToken {
                    token: token.to_string(),
                    expires_at: parse_timestamp("token.expires_at", expires)?,
                })
            }
        }
    }
}

impl fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthProtocol::V1 => f.write_str("v1"),
            AuthProtocol::V2 => f.write_str("v2"),
            AuthProtocol::V3 => f.write_str("v3"),
        }
    }
}

fn v2_body(credentials: &Credentials) -> Value {
    let mut auth = json!({
        "passwordCredentials": {
            "username": credentials.user(),
            "password": credentials.password(),
        }
    });

    match credentials.project() {
        Some(ProjectScope::Id(id)) => auth["tenantId"] = json!(id),
        Some(ProjectScope::Name(name)) => auth["tenantName"] = json!(name),
        None => {}
    }

    json!({ "auth": auth })
}

fn v3_body(credentials: &Credentials) -> Value {
    let user = match credentials.domain() {
        Some(domain) => json!({
            "name": credentials.user(),
            "domain": { "name": domain },
            "password": credentials.password(),
        }),
        None => json!({
            "id": credentials.user(),
            "password": credentials.password(),
        }),
    };

    let mut auth = json!({
        "identity": {
            "methods": ["password"],
            "password": { "user": user },
        }
    });

    match credentials.project() {
        Some(ProjectScope::Id(id)) => {
            auth["scope"] = json!({ "project": { "id": id } });
        }
        Some(ProjectScope::Name(name)) => {
            // Project names are only unique within a domain.
            let domain = credentials.domain().unwrap_or("default");
            auth["scope"] = json!({
                "project": { "name": name, "domain": { "name": domain } }
            });
        }
        None => {}
    }

    json!({ "auth": auth })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingHeader(name))
}

fn json_str<'a>(
    body: &'a Value,
    pointer: &str,
    field: &'static str,
) -> Result<&'a str, AuthError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or(AuthError::MissingField(field))
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, AuthError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AuthError::InvalidExpiry {
            field,
            value: value.to_string(),
        })
}
