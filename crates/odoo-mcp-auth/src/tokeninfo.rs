//! Opaque access-token validation through Google's tokeninfo endpoint
//!
//! Google access tokens are not JWTs. The tokeninfo endpoint plays the role
//! of an RFC 7662 introspection endpoint: a 200 response describes a live
//! token, anything else means the token is not valid.

use crate::claims::{Audience, ValidatedClaims};
use crate::error::TokenError;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Lifetime assumed when a live token's response carries neither `exp` nor
/// `expires_in`. Google access tokens are issued for one hour; the token
/// cache ceiling bounds it further.
const ASSUMED_LIFETIME_SECS: u64 = 3600;

/// Body of a successful tokeninfo response.
///
/// Google encodes numbers and booleans as strings here.
#[serde_as]
#[derive(Clone, Deserialize)]
pub struct TokenInfo {
    /// Audience (the OAuth client the token was issued to)
    #[serde(default)]
    pub aud: Option<String>,
    /// Authorized party
    #[serde(default)]
    pub azp: Option<String>,
    /// Subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// `"true"` when Google verified the email
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub email_verified: Option<bool>,
    /// Absolute expiry, seconds since epoch
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub exp: Option<u64>,
    /// Remaining lifetime in seconds
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub expires_in: Option<i64>,
    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("aud", &self.aud)
            .field("sub", &self.sub)
            .field("email", &self.email)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenInfoError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the tokeninfo endpoint.
#[derive(Debug, Clone)]
pub struct TokenInfoClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl TokenInfoClient {
    /// Create a client for `endpoint`. The HTTP client carries the timeout.
    pub fn new(endpoint: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client,
        }
    }

    /// Ask the provider about `token`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidToken`] when the provider rejects the token
    /// - [`TokenError::Upstream`] when the endpoint is unreachable or times out
    /// - [`TokenError::Validation`] when a 200 response is not understood
    pub async fn lookup(&self, token: &str) -> Result<TokenInfo, TokenError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("access_token", token)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "tokeninfo request failed");
                TokenError::upstream("tokeninfo", e.to_string())
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TokenError::upstream(
                "tokeninfo",
                format!("endpoint returned status {status}"),
            ));
        }
        if !status.is_success() {
            let body: TokenInfoError = response.json().await.unwrap_or_default();
            let reason = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(TokenError::InvalidToken(format!(
                "Google token validation failed: {reason}"
            )));
        }

        response.json::<TokenInfo>().await.map_err(|e| {
            if e.is_timeout() {
                TokenError::upstream("tokeninfo", e.to_string())
            } else {
                TokenError::Validation(format!("unreadable tokeninfo response: {e}"))
            }
        })
    }
}

impl TokenInfo {
    /// Normalize into claims, checking audience and remaining lifetime.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidAudience`] if neither `aud` nor `azp` equals `audience`
    /// - [`TokenError::TokenExpired`] if `expires_in` is not positive
    /// - [`TokenError::InvalidToken`] if the subject is missing
    pub fn into_claims(self, issuer: &str, audience: &str, now: u64) -> Result<ValidatedClaims, TokenError> {
        let token_aud = self.aud.clone().or_else(|| self.azp.clone());
        if token_aud.as_deref() != Some(audience) {
            return Err(TokenError::InvalidAudience {
                expected: audience.to_string(),
            });
        }

        if self.expires_in.is_some_and(|secs| secs <= 0) {
            return Err(TokenError::TokenExpired);
        }

        let sub = self
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::InvalidToken("tokeninfo response has no subject".to_string()))?;

        let exp = match (self.exp, self.expires_in) {
            (Some(exp), _) => exp,
            (None, Some(secs)) => now.saturating_add(secs as u64),
            (None, None) => {
                warn!("tokeninfo response has no expiry, assuming {ASSUMED_LIFETIME_SECS}s");
                now.saturating_add(ASSUMED_LIFETIME_SECS)
            }
        };
        if exp <= now {
            return Err(TokenError::TokenExpired);
        }

        info!(email = ?self.email, "Google access token validated");
        Ok(ValidatedClaims {
            iss: issuer.to_string(),
            sub,
            aud: Audience::Single(audience.to_string()),
            exp,
            iat: None,
            email: self.email,
            email_verified: Some(self.email_verified == Some(true)),
            scope: Some(self.scope.unwrap_or_default()),
            azp: self.azp,
            employee_id: None,
            extra: HashMap::new(),
        })
    }
}
