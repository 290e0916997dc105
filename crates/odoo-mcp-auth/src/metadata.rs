//! Protected Resource Metadata (RFC 9728)
//!
//! Built once at startup and served unchanged from
//! `/.well-known/oauth-protected-resource`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Path the metadata document is served at.
pub const METADATA_PATH: &str = "/.well-known/oauth-protected-resource";

/// Invalid metadata configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// The resource identifier is not a usable absolute URI
    #[error("invalid resource identifier: {0}")]
    InvalidResourceUri(String),

    /// No authorization server was configured
    #[error("at least one authorization server is required")]
    MissingAuthorizationServer,
}

/// RFC 9728 metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Canonical identifier of this resource
    pub resource: String,
    /// Authorization servers whose tokens are accepted
    pub authorization_servers: Vec<String>,
    /// Scopes clients may request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    /// How the bearer token may be presented
    pub bearer_methods_supported: Vec<String>,
    /// Human-readable documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
    /// Accepted token signing algorithms
    pub resource_signing_alg_values_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    /// Start building metadata for `resource`.
    pub fn builder(resource: impl Into<String>) -> ProtectedResourceMetadataBuilder {
        ProtectedResourceMetadataBuilder {
            resource: resource.into(),
            authorization_servers: Vec::new(),
            scopes: Vec::new(),
            bearer_methods: vec!["header".to_string()],
            documentation_uri: None,
            signing_algs: vec!["RS256".to_string(), "ES256".to_string()],
        }
    }

    /// Absolute URL of the metadata document for this resource.
    pub fn metadata_url(&self) -> String {
        format!("{}{}", self.resource.trim_end_matches('/'), METADATA_PATH)
    }
}

/// Builder for [`ProtectedResourceMetadata`].
#[derive(Debug, Clone)]
pub struct ProtectedResourceMetadataBuilder {
    resource: String,
    authorization_servers: Vec<String>,
    scopes: Vec<String>,
    bearer_methods: Vec<String>,
    documentation_uri: Option<String>,
    signing_algs: Vec<String>,
}

impl ProtectedResourceMetadataBuilder {
    /// Add a trusted authorization server.
    pub fn authorization_server(mut self, server: impl Into<String>) -> Self {
        self.authorization_servers.push(server.into());
        self
    }

    /// Set advertised scopes.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set documentation URI.
    pub fn documentation(mut self, uri: impl Into<String>) -> Self {
        self.documentation_uri = Some(uri.into());
        self
    }

    /// Set accepted signing algorithms.
    pub fn signing_algorithms<I, S>(mut self, algs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signing_algs = algs.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the resource identifier is not canonical
    /// or no authorization server was added.
    pub fn build(self) -> Result<ProtectedResourceMetadata, MetadataError> {
        let resource = canonical_resource_uri(&self.resource)?;
        if self.authorization_servers.is_empty() {
            return Err(MetadataError::MissingAuthorizationServer);
        }
        Ok(ProtectedResourceMetadata {
            resource,
            authorization_servers: self.authorization_servers,
            scopes_supported: self.scopes,
            bearer_methods_supported: self.bearer_methods,
            resource_documentation: self.documentation_uri,
            resource_signing_alg_values_supported: self.signing_algs,
        })
    }
}

/// Validate a resource identifier (RFC 8707) and return its canonical form.
///
/// - `https`, or `http` only for loopback hosts
/// - host required, fragment forbidden
/// - scheme and host lowercased, default port dropped, trailing slash trimmed
///
/// # Errors
///
/// Returns [`MetadataError::InvalidResourceUri`] describing the first violation.
pub fn canonical_resource_uri(uri: &str) -> Result<String, MetadataError> {
    let url = Url::parse(uri)
        .map_err(|e| MetadataError::InvalidResourceUri(format!("{uri}: {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| MetadataError::InvalidResourceUri(format!("{uri}: missing host")))?;

    match url.scheme() {
        "https" => {}
        "http" if matches!(host, "localhost" | "127.0.0.1" | "[::1]") => {}
        "http" => {
            return Err(MetadataError::InvalidResourceUri(format!(
                "{uri}: https required (http only allowed for localhost)"
            )));
        }
        scheme => {
            return Err(MetadataError::InvalidResourceUri(format!(
                "{uri}: unsupported scheme {scheme}"
            )));
        }
    }

    if url.fragment().is_some() {
        return Err(MetadataError::InvalidResourceUri(format!(
            "{uri}: fragment not allowed"
        )));
    }

    // Url already lowercases scheme and host and drops default ports
    let mut canonical = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        canonical.push_str(&format!(":{port}"));
    }
    canonical.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        canonical.push('?');
        canonical.push_str(query);
    }
    Ok(canonical)
}
