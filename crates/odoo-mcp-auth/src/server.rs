//! Resource server: the entry point request middleware calls
//!
//! - bearer token extraction from the `Authorization` header
//! - delegation to the [`TokenValidator`]
//! - `WWW-Authenticate` challenge construction for 401 responses

use crate::claims::ValidatedClaims;
use crate::error::TokenError;
use crate::metadata::ProtectedResourceMetadata;
use crate::validator::TokenValidator;
use std::sync::Arc;

/// Realm announced in `WWW-Authenticate` challenges.
pub const DEFAULT_REALM: &str = "odoo-mcp";

/// Shared, long-lived resource-server state.
///
/// Holds the immutable discovery metadata and the validator. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ResourceServer {
    metadata: Arc<ProtectedResourceMetadata>,
    validator: TokenValidator,
    realm: String,
}

impl ResourceServer {
    /// Combine metadata and a validator.
    pub fn new(metadata: ProtectedResourceMetadata, validator: TokenValidator) -> Self {
        Self {
            metadata: Arc::new(metadata),
            validator,
            realm: DEFAULT_REALM.to_string(),
        }
    }

    /// Override the challenge realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Discovery metadata.
    pub fn metadata(&self) -> &ProtectedResourceMetadata {
        &self.metadata
    }

    /// Audience tokens must carry.
    pub fn audience(&self) -> &str {
        &self.validator.config().audience
    }

    /// Validate a bearer token.
    ///
    /// # Errors
    ///
    /// Propagates [`TokenValidator::validate`] failures unchanged.
    pub async fn validate_token_async(&self, token: &str) -> Result<Arc<ValidatedClaims>, TokenError> {
        self.validator.validate(token).await
    }

    /// Extract the bearer token from an `Authorization` header value and
    /// validate it.
    ///
    /// # Errors
    ///
    /// [`TokenError::MissingToken`] or [`TokenError::MalformedHeader`] for
    /// header problems, otherwise the validator's error.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<Arc<ValidatedClaims>, TokenError> {
        let token = extract_bearer_token(authorization)?;
        self.validate_token_async(token).await
    }

    /// `WWW-Authenticate` value for a rejected request.
    pub fn challenge(&self, error: &TokenError) -> String {
        let builder = WwwAuthenticate::new(&self.realm).resource_metadata(self.metadata.metadata_url());
        if error.is_invalid_token() {
            builder.error("invalid_token", Some(&error.to_string())).build()
        } else {
            builder.build()
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively and the value must consist of
/// exactly the scheme and one token.
///
/// # Errors
///
/// - [`TokenError::MissingToken`] when the header is absent or blank
/// - [`TokenError::MalformedHeader`] for any other scheme or shape
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, TokenError> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(TokenError::MissingToken)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(TokenError::MalformedHeader),
    }
}

/// `WWW-Authenticate` header builder (RFC 6750 §3, RFC 9728 §5.1).
#[derive(Debug, Clone)]
pub struct WwwAuthenticate {
    realm: String,
    resource_metadata: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl WwwAuthenticate {
    /// Challenge for `realm`.
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            resource_metadata: None,
            scope: None,
            error: None,
            error_description: None,
        }
    }

    /// Point clients at the metadata document.
    pub fn resource_metadata(mut self, url: impl Into<String>) -> Self {
        self.resource_metadata = Some(url.into());
        self
    }

    /// Scope the client should request.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Error code and description.
    pub fn error(mut self, error: impl Into<String>, description: Option<&str>) -> Self {
        self.error = Some(error.into());
        self.error_description = description.map(str::to_string);
        self
    }

    /// Render the header value.
    ///
    /// ```text
    /// Bearer realm="odoo-mcp", resource_metadata="https://...", error="invalid_token"
    /// ```
    pub fn build(self) -> String {
        let mut parts = vec![format!("Bearer realm=\"{}\"", quote_safe(&self.realm))];
        if let Some(url) = self.resource_metadata {
            parts.push(format!("resource_metadata=\"{}\"", quote_safe(&url)));
        }
        if let Some(scope) = self.scope {
            parts.push(format!("scope=\"{}\"", quote_safe(&scope)));
        }
        if let Some(error) = self.error {
            parts.push(format!("error=\"{}\"", quote_safe(&error)));
        }
        if let Some(description) = self.error_description {
            parts.push(format!("error_description=\"{}\"", quote_safe(&description)));
        }
        parts.join(", ")
    }
}

/// Drop characters that would break out of a quoted-string.
fn quote_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer_token(Some("bearer token")), Ok("token"));
        assert_eq!(extract_bearer_token(Some("BEARER  token ")), Ok("token"));
    }

    #[test]
    fn test_extract_bearer_token_failures() {
        assert_eq!(extract_bearer_token(None), Err(TokenError::MissingToken));
        assert_eq!(extract_bearer_token(Some("   ")), Err(TokenError::MissingToken));
        assert_eq!(
            extract_bearer_token(Some("Basic dXNlcjpwYXNz")),
            Err(TokenError::MalformedHeader)
        );
        assert_eq!(extract_bearer_token(Some("Bearer")), Err(TokenError::MalformedHeader));
        assert_eq!(
            extract_bearer_token(Some("Bearer a b")),
            Err(TokenError::MalformedHeader)
        );
    }

    #[test]
    fn test_www_authenticate_rendering() {
        assert_eq!(WwwAuthenticate::new("odoo-mcp").build(), "Bearer realm=\"odoo-mcp\"");

        let header = WwwAuthenticate::new("odoo-mcp")
            .resource_metadata("https://mcp.example.com/.well-known/oauth-protected-resource")
            .scope("odoo.read")
            .error("invalid_token", Some("token has \"expired\""))
            .build();
        assert_eq!(
            header,
            "Bearer realm=\"odoo-mcp\", \
             resource_metadata=\"https://mcp.example.com/.well-known/oauth-protected-resource\", \
             scope=\"odoo.read\", error=\"invalid_token\", error_description=\"token has expired\""
        );
    }

    fn resource_server() -> ResourceServer {
        let metadata = ProtectedResourceMetadata::builder("https://mcp.example.com")
            .authorization_server("https://auth.example.com")
            .build()
            .unwrap();
        let validator = TokenValidator::builder(ValidatorConfig::custom(
            "https://auth.example.com",
            "https://mcp.example.com",
        ))
        .build()
        .unwrap();
        ResourceServer::new(metadata, validator)
    }

    #[test]
    fn test_challenge_for_missing_and_invalid_tokens() {
        let server = resource_server();

        let missing = server.challenge(&TokenError::MissingToken);
        assert!(missing.starts_with("Bearer realm=\"odoo-mcp\""));
        assert!(!missing.contains("error="));

        let expired = server.challenge(&TokenError::TokenExpired);
        assert!(expired.starts_with("Bearer realm=\"odoo-mcp\""));
        assert!(expired.contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_missing_header_without_validation() {
        let server = resource_server();
        assert_eq!(server.authenticate(None).await, Err(TokenError::MissingToken));
        assert_eq!(server.audience(), "https://mcp.example.com");
    }
}
