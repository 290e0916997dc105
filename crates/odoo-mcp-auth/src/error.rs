//! Error types for token validation and employee resolution
//!
//! Each operation has its own discriminated error so that callers handle
//! "bad credential", "no such employee" and "upstream unreachable" as
//! distinct cases. Only upstream-connectivity failures are retryable.

use http::StatusCode;
use thiserror::Error;

/// Failure of bearer-token extraction or validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// No `Authorization` header was presented
    #[error("missing bearer token")]
    MissingToken,

    /// `Authorization` header present but not `Bearer <token>`
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Token expiry is in the past
    #[error("token has expired")]
    TokenExpired,

    /// `iss` claim does not match the configured issuer
    #[error("invalid token issuer, expected {expected}")]
    InvalidIssuer {
        /// The issuer this resource server trusts
        expected: String,
    },

    /// `aud` claim does not contain the configured audience
    #[error("invalid token audience, expected {expected}")]
    InvalidAudience {
        /// The audience this resource server expects
        expected: String,
    },

    /// Bad signature, disallowed algorithm, unknown key, rejected by the provider
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Any other malformed or unverifiable input
    #[error("token validation failed: {0}")]
    Validation(String),

    /// Key-distribution or introspection endpoint unreachable or timed out
    #[error("{service} unavailable: {message}")]
    Upstream {
        /// Which upstream failed (e.g. `jwks`, `tokeninfo`)
        service: &'static str,
        /// Transport-level description
        message: String,
    },
}

impl TokenError {
    pub(crate) fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Whether an outer layer may retry the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }

    /// Stable machine-readable reason, suitable for `error=` parameters and
    /// JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken | Self::MalformedHeader => "invalid_request",
            Self::TokenExpired => "token_expired",
            Self::InvalidIssuer { .. } => "invalid_issuer",
            Self::InvalidAudience { .. } => "invalid_audience",
            Self::InvalidToken(_) | Self::Validation(_) => "invalid_token",
            Self::Upstream { .. } => "temporarily_unavailable",
        }
    }

    /// HTTP status this error maps to at the request boundary.
    pub fn status_code(&self) -> StatusCode {
        if self.is_retryable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    /// True when a token was presented but rejected, as opposed to absent.
    pub fn is_invalid_token(&self) -> bool {
        !matches!(
            self,
            Self::MissingToken | Self::MalformedHeader | Self::Upstream { .. }
        )
    }
}

/// Failure reported by an ERP record store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connection refused, timeout, 5xx
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with a fault
    #[error("record store fault: {0}")]
    Fault(String),
}

impl StoreError {
    /// Whether the failed call may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Failure to map a principal to an employee record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No lookup strategy produced a match
    #[error("no matching backend account for {}", email.as_deref().unwrap_or("this identity"))]
    EmployeeNotFound {
        /// The email the lookups were attempted with
        email: Option<String>,
    },

    /// The record store failed before any strategy could succeed
    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl ResolveError {
    /// Whether an outer layer may retry the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmployeeNotFound { .. } => false,
            Self::Backend(e) => e.is_retryable(),
        }
    }

    /// HTTP status this error maps to at the request boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmployeeNotFound { .. } => StatusCode::FORBIDDEN,
            Self::Backend(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
