//! Validator configuration
//!
//! Whether the trusted authority is the federated OIDC provider (Google) or a
//! custom authorization server is decided once, here, and carried as
//! [`AuthorityKind`]. The validator branches on the tag and never compares
//! issuer strings at request time.

use jsonwebtoken::Algorithm;
use std::time::Duration;

/// Issuer of Google ID tokens.
pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";

/// Google's published signing keys.
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Google's access-token introspection equivalent.
pub const GOOGLE_TOKENINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";

/// Default ceiling on how long validated claims are trusted from cache.
pub const DEFAULT_TOKEN_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default lifetime of a fetched key set.
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default timeout for outbound identity-provider calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Which kind of authority issues the tokens this server accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityKind {
    /// Federated OIDC provider: RS256 ID tokens plus opaque access tokens
    /// checked through a tokeninfo endpoint.
    Federated {
        /// Endpoint used to validate opaque access tokens
        tokeninfo_endpoint: String,
        /// Expected `azp` claim, checked when the token carries one
        authorized_party: Option<String>,
    },
    /// Custom authorization server issuing signed JWT access tokens.
    Custom,
}

impl AuthorityKind {
    /// Federated authority using Google's tokeninfo endpoint.
    pub fn google(client_id: impl Into<String>) -> Self {
        Self::Federated {
            tokeninfo_endpoint: GOOGLE_TOKENINFO_ENDPOINT.to_string(),
            authorized_party: Some(client_id.into()),
        }
    }

    /// Whether this is the federated provider.
    pub fn is_federated(&self) -> bool {
        matches!(self, Self::Federated { .. })
    }

    /// Signing algorithms accepted for structured tokens.
    ///
    /// Asymmetric only; `none` and HMAC variants are never accepted.
    pub fn allowed_algorithms(&self) -> &'static [Algorithm] {
        match self {
            Self::Federated { .. } => &[Algorithm::RS256],
            Self::Custom => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
                Algorithm::ES256,
                Algorithm::ES384,
            ],
        }
    }

    /// Claims that must be present in a structured token.
    pub fn required_claims(&self) -> &'static [&'static str] {
        match self {
            Self::Federated { .. } => &["exp", "iss", "aud", "sub", "email"],
            Self::Custom => &["exp", "iss", "aud", "sub"],
        }
    }
}

/// Everything the token validator needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Exact-match issuer
    pub issuer: String,
    /// Exact-match audience
    pub audience: String,
    /// Key-distribution endpoint
    pub jwks_uri: String,
    /// Federated or custom authority
    pub authority: AuthorityKind,
    /// Ceiling on token-cache entry lifetime
    pub token_cache_ttl: Duration,
    /// Lifetime of a fetched key set
    pub jwks_cache_ttl: Duration,
    /// Tolerance applied to the expiry check
    pub clock_skew: Duration,
    /// Timeout for JWKS and tokeninfo calls
    pub http_timeout: Duration,
}

impl ValidatorConfig {
    /// Configuration for Google-issued tokens, where the audience is the
    /// registered OAuth client id.
    pub fn google(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            issuer: GOOGLE_ISSUER.to_string(),
            audience: client_id.clone(),
            jwks_uri: GOOGLE_JWKS_URI.to_string(),
            authority: AuthorityKind::google(client_id),
            token_cache_ttl: DEFAULT_TOKEN_CACHE_TTL,
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            clock_skew: Duration::ZERO,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Configuration for a custom authorization server, where the audience
    /// is this resource's own identifier.
    pub fn custom(issuer: impl Into<String>, resource_identifier: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let jwks_uri = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
        Self {
            issuer,
            audience: resource_identifier.into(),
            jwks_uri,
            authority: AuthorityKind::Custom,
            token_cache_ttl: DEFAULT_TOKEN_CACHE_TTL,
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            clock_skew: Duration::ZERO,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Override the key-distribution endpoint.
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = jwks_uri.into();
        self
    }

    /// Override the tokeninfo endpoint. Has no effect on a custom authority.
    pub fn with_tokeninfo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        if let AuthorityKind::Federated {
            tokeninfo_endpoint, ..
        } = &mut self.authority
        {
            *tokeninfo_endpoint = endpoint.into();
        }
        self
    }

    /// Override the token-cache ceiling.
    pub fn with_token_cache_ttl(mut self, ttl: Duration) -> Self {
        self.token_cache_ttl = ttl;
        self
    }

    /// Override the key-set lifetime.
    pub fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Allow some clock skew on the expiry check.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Override the outbound call timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
