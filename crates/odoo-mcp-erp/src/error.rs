//! Odoo error classification
//!
//! Faults are classified from the exception class Odoo reports in the
//! JSON-RPC error payload, falling back to the legacy numeric codes:
//!
//! | Exception / code          | Kind                                   |
//! |---------------------------|----------------------------------------|
//! | `AccessDenied` / 3        | [`OdooErrorKind::AccessDenied`]        |
//! | `AccessError` / 4         | [`OdooErrorKind::PermissionDenied`]    |
//! | `MissingError` / 2        | [`OdooErrorKind::RecordNotFound`]      |
//! | `UserError`, `ValidationError` / 1 | [`OdooErrorKind::Validation`] |

use serde::Deserialize;
use thiserror::Error;

/// Result type for Odoo calls.
pub type OdooResult<T> = Result<T, OdooError>;

/// What went wrong talking to Odoo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdooErrorKind {
    /// Service credentials rejected
    AccessDenied,
    /// Authenticated but not allowed to touch the record
    PermissionDenied,
    /// Record does not exist
    RecordNotFound,
    /// Business-rule or field validation failed
    Validation,
    /// Network failure
    Connection,
    /// Request timed out
    Timeout,
    /// Odoo answered 5xx
    Server,
    /// Response could not be understood
    Protocol,
    /// Fault that fits no other kind
    Unknown,
}

impl OdooErrorKind {
    /// Stable code for error bodies.
    pub fn code(self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::Connection => "CONNECTION_ERROR",
            Self::Timeout => "CONNECTION_TIMEOUT",
            Self::Server => "SERVER_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    fn from_exception(name: &str) -> Option<Self> {
        let class = name.rsplit('.').next().unwrap_or(name);
        match class {
            "AccessDenied" => Some(Self::AccessDenied),
            "AccessError" => Some(Self::PermissionDenied),
            "MissingError" => Some(Self::RecordNotFound),
            "UserError" | "ValidationError" => Some(Self::Validation),
            _ => None,
        }
    }

    fn from_legacy_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Validation),
            2 => Some(Self::RecordNotFound),
            3 => Some(Self::AccessDenied),
            4 => Some(Self::PermissionDenied),
            _ => None,
        }
    }
}

/// Error returned by every [`OdooClient`](crate::OdooClient) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{}] {message}", kind.code())]
pub struct OdooError {
    /// Classification
    pub kind: OdooErrorKind,
    /// Human-readable message, without tracebacks
    pub message: String,
}

impl OdooError {
    /// Error of `kind` with `message`.
    pub fn new(kind: OdooErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the call may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            OdooErrorKind::Connection | OdooErrorKind::Timeout | OdooErrorKind::Server
        )
    }

    /// Classify a JSON-RPC error object.
    pub fn from_fault(fault: &Fault) -> Self {
        let data = fault.data.as_ref();
        let kind = data
            .and_then(|d| d.name.as_deref())
            .and_then(OdooErrorKind::from_exception)
            .or_else(|| OdooErrorKind::from_legacy_code(fault.code))
            .unwrap_or(OdooErrorKind::Unknown);

        let message = data
            .and_then(|d| d.message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.trim().to_string())
            .or_else(|| data.and_then(|d| d.debug.as_deref()).map(extract_message))
            .unwrap_or_else(|| extract_message(&fault.message));

        let message = if kind == OdooErrorKind::Unknown {
            format!("Odoo error (code {}): {message}", fault.code)
        } else {
            message
        };
        Self { kind, message }
    }

    /// Classify a transport failure.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::new(OdooErrorKind::Timeout, format!("Connection timed out: {error}"))
        } else if error.is_connect() {
            Self::new(
                OdooErrorKind::Connection,
                "Connection refused - Odoo server may be down",
            )
        } else if error.is_decode() {
            Self::new(OdooErrorKind::Protocol, format!("Unreadable response: {error}"))
        } else {
            Self::new(OdooErrorKind::Connection, format!("Network error: {error}"))
        }
    }
}

/// JSON-RPC `error` member as Odoo sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fault {
    /// Numeric code (`200` for server errors, legacy 1..4)
    #[serde(default)]
    pub code: i64,
    /// Generic message, e.g. "Odoo Server Error"
    #[serde(default)]
    pub message: String,
    /// Exception details
    #[serde(default)]
    pub data: Option<FaultData>,
}

/// Exception details inside a [`Fault`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaultData {
    /// Qualified exception class, e.g. `odoo.exceptions.AccessError`
    #[serde(default)]
    pub name: Option<String>,
    /// Exception message
    #[serde(default)]
    pub message: Option<String>,
    /// Server traceback
    #[serde(default)]
    pub debug: Option<String>,
}

const EXCEPTION_PREFIXES: &[&str] = &[
    "UserError:",
    "ValidationError:",
    "MissingError:",
    "AccessError:",
    "AccessDenied:",
];

const NOISE_PREFIXES: &[&str] = &["Traceback ", "File ", "  "];

/// Pull the meaningful line out of a fault string or traceback.
pub(crate) fn extract_message(text: &str) -> String {
    for prefix in EXCEPTION_PREFIXES {
        if let Some((_, rest)) = text.split_once(prefix) {
            return rest.trim().lines().next().unwrap_or_default().trim().to_string();
        }
    }

    let first = text.lines().next().unwrap_or_default();
    if NOISE_PREFIXES.iter().any(|p| first.starts_with(p)) {
        let meaningful = text
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty() && !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)));
        if let Some(line) = meaningful {
            return line.to_string();
        }
    }

    match first.trim() {
        "" => text.to_string(),
        line => line.to_string(),
    }
}
