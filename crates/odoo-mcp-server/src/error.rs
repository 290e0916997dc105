//! Server error type and its JSON-RPC mapping
//!
//! | Variant                          | JSON-RPC | HTTP    |
//! |----------------------------------|----------|---------|
//! | `Token`                          | -32008   | 401/503 |
//! | `InsufficientScope`              | -32011   | 403     |
//! | `Resolve` (not found)            | -32011   | 403     |
//! | `Resolve` (backend)              | -32013/-32016 | 503/502 |
//! | `Odoo`                           | by kind  | by kind |
//! | `InvalidParams`                  | -32602   | 400     |
//! | `MethodNotFound`                 | -32601   | 404     |
//! | `ToolNotFound`                   | -32001   | 404     |
//! | `ResourceNotFound`               | -32004   | 404     |
//! | `Config`, `Internal`             | -32015/-32603 | 500 |

use crate::config::ConfigError;
use http::StatusCode;
use odoo_mcp_auth::{ResolveError, TokenError};
use odoo_mcp_erp::{OdooError, OdooErrorKind};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Result alias used by request handlers.
pub type ServerResult<T> = Result<T, ServerError>;

/// Anything that can fail while serving a request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Startup configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bearer token rejected or validation upstream unreachable
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Caller lacks every scope the tool accepts
    #[error("Insufficient scope for tool: {tool}")]
    InsufficientScope {
        /// Tool that was called
        tool: String,
        /// Scopes any one of which would have sufficed
        required: Vec<String>,
    },

    /// Principal could not be mapped to an employee
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Odoo call failed
    #[error(transparent)]
    Odoo(#[from] OdooError),

    /// Missing or mistyped request parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Unknown JSON-RPC method
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Unknown tool name
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Unknown resource URI
    #[error("Unknown resource: {0}")]
    ResourceNotFound(String),

    /// Unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerError {
    /// JSON-RPC error code.
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            Self::Token(_) => -32008,
            Self::InsufficientScope { .. } => -32011,
            Self::Resolve(ResolveError::EmployeeNotFound { .. }) => -32011,
            Self::Resolve(e) if e.is_retryable() => -32013,
            Self::Resolve(_) => -32016,
            Self::Odoo(e) => match e.kind {
                OdooErrorKind::PermissionDenied => -32011,
                OdooErrorKind::Timeout => -32012,
                OdooErrorKind::Connection | OdooErrorKind::Server => -32013,
                OdooErrorKind::RecordNotFound | OdooErrorKind::Validation => -32002,
                OdooErrorKind::AccessDenied | OdooErrorKind::Protocol | OdooErrorKind::Unknown => -32016,
            },
            Self::InvalidParams(_) => -32602,
            Self::MethodNotFound(_) => -32601,
            Self::ToolNotFound(_) => -32001,
            Self::ResourceNotFound(_) => -32004,
            Self::Config(_) => -32015,
            Self::Internal(_) => -32603,
        }
    }

    /// HTTP-equivalent status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Token(e) => e.status_code(),
            Self::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            Self::Resolve(e) => e.status_code(),
            Self::Odoo(e) => match e.kind {
                OdooErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                OdooErrorKind::RecordNotFound => StatusCode::NOT_FOUND,
                OdooErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                OdooErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                OdooErrorKind::Connection | OdooErrorKind::Server => StatusCode::SERVICE_UNAVAILABLE,
                OdooErrorKind::AccessDenied | OdooErrorKind::Protocol | OdooErrorKind::Unknown => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) | Self::ResourceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable reason.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Token(e) => e.error_code(),
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::Resolve(ResolveError::EmployeeNotFound { .. }) => "employee_not_found",
            Self::Resolve(e) if e.is_retryable() => "temporarily_unavailable",
            Self::Resolve(_) => "backend_error",
            Self::Odoo(e) if e.is_retryable() => "temporarily_unavailable",
            Self::Odoo(e) => e.kind.code(),
            Self::InvalidParams(_) => "invalid_params",
            Self::MethodNotFound(_) => "method_not_found",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::Config(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Never echoes tokens or the caller's email; internal details of
    /// configuration and unexpected failures are replaced.
    pub fn public_message(&self) -> String {
        match self {
            Self::Resolve(ResolveError::EmployeeNotFound { .. }) => {
                "no matching backend account for your identity".to_string()
            }
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// `{ code, message, data: { status, error, ... } }`
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        let mut data = json!({
            "status": self.status_code().as_u16(),
            "error": self.error_code(),
        });
        if let Self::InsufficientScope { tool, required } = self {
            data["tool"] = json!(tool);
            data["required_scopes"] = json!(required);
        }
        if let Some(retryable) = self.retryable() {
            data["retryable"] = json!(retryable);
        }
        JsonRpcError {
            code: self.jsonrpc_code(),
            message: self.public_message(),
            data: Some(data),
        }
    }

    fn retryable(&self) -> Option<bool> {
        match self {
            Self::Token(e) => Some(e.is_retryable()),
            Self::Resolve(e) => Some(e.is_retryable()),
            Self::Odoo(e) => Some(e.is_retryable()),
            _ => None,
        }
    }
}

impl From<ServerError> for JsonRpcError {
    fn from(err: ServerError) -> Self {
        err.to_jsonrpc()
    }
}
