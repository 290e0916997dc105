//! # Odoo MCP ERP - Odoo JSON-RPC client
//!
//! Async client for Odoo's `/jsonrpc` endpoint, authenticated as a single
//! service account.
//!
//! - [`OdooClient`] - login with a cached uid, `execute_kw` and typed helpers
//! - [`OdooError`] - faults classified into [`OdooErrorKind`]
//! - [`RecordStore`](odoo_mcp_auth::RecordStore) implementation so the
//!   client can back employee resolution
//!
//! ```rust,no_run
//! use odoo_mcp_erp::{OdooClient, OdooConfig, SearchOptions};
//! use secrecy::SecretString;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), odoo_mcp_erp::OdooError> {
//! let client = OdooClient::new(OdooConfig::new(
//!     "https://erp.example.com",
//!     "production",
//!     "mcp-service",
//!     SecretString::new("api-key".to_string()),
//! ))?;
//!
//! let partners = client
//!     .search_read("res.partner", json!([["is_company", "=", true]]), &SearchOptions::default().limit(10))
//!     .await?;
//! println!("{} companies", partners.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
mod store;

pub use client::{DEFAULT_SEARCH_LIMIT, DEFAULT_TIMEOUT, OdooClient, OdooConfig, SearchOptions};
pub use error::{Fault, FaultData, OdooError, OdooErrorKind, OdooResult};
