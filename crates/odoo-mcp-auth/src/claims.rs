//! Typed claims produced by token validation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use std::collections::HashMap;

/// Claim carrying a pre-resolved Odoo employee id, issued by the custom
/// authorization server.
pub const EMPLOYEE_ID_CLAIM: &str = "odoo_employee_id";

/// `aud` claim: a single string or an array of strings (RFC 7519 §4.1.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience value
    Single(String),
    /// Multiple audience values
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `expected` is one of the audiences.
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Multiple(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// Claims of a successfully validated token.
///
/// The fields the resource server depends on are typed; everything else the
/// provider sent is kept in `extra`. Instances are never mutated after
/// validation and are shared through `Arc`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience
    pub aud: Audience,
    /// Expiry (seconds since epoch)
    pub exp: u64,
    /// Issued at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the provider verified the email. Google sends `"true"` from
    /// tokeninfo and `true` in ID tokens.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Space-delimited granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Authorized party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Pre-resolved employee id
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "odoo_employee_id", skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<i64>,
    /// Provider-specific extension claims
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ValidatedClaims {
    /// Whether the email is present and marked verified.
    pub fn has_verified_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty()) && self.email_verified == Some(true)
    }
}
