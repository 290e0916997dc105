//! # Odoo MCP Server
//!
//! Model Context Protocol server over HTTP that exposes Odoo records and
//! employee self-service tools to authenticated users.
//!
//! ## Request flow
//!
//! 1. [`auth::authenticate`] validates the bearer token and attaches a
//!    [`Principal`](odoo_mcp_auth::Principal)
//! 2. [`router::route_request`] dispatches the JSON-RPC method
//! 3. [`tools::call_tool`] gates on scopes, resolves the caller's employee
//!    for self-service tools and calls Odoo
//!
//! ## Modules
//!
//! - [`config`] - layered file and environment configuration
//! - [`logging`] - tracing subscriber setup
//! - [`state`] - [`AppState`] shared by handlers
//! - [`http`] - routes, security headers, CORS, graceful shutdown
//! - [`tools`] / [`resources`] - MCP tools and resources
//! - [`error`] - [`ServerError`] and its JSON-RPC mapping

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod resources;
pub mod router;
pub mod state;
pub mod tools;

pub use config::{ConfigError, ServerConfig};
pub use error::{JsonRpcError, ServerError, ServerResult};
pub use state::AppState;

/// Name reported in `serverInfo` and `/health`.
pub const SERVER_NAME: &str = "odoo-mcp-server";

/// Crate version.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP protocol revision answered to `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
