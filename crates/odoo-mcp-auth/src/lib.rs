//! # Odoo MCP Auth - OAuth 2.1 Resource Server
//!
//! Bearer-token validation, identity mapping and scope gating for the Odoo
//! MCP server.
//!
//! ## Key Features
//!
//! - **JWT validation** - RS/PS/ES signatures against a cached JWKS, with
//!   issuer, audience and expiry checks
//! - **Google opaque tokens** - validated through the tokeninfo endpoint
//! - **Token cache** - keyed by a SHA-256 digest, bounded by token expiry
//! - **Federated default grant** - scope-less Google tokens with a verified
//!   email receive a default scope set
//! - **Employee resolution** - principal to `hr.employee` with several
//!   lookup strategies and a TTL cache
//! - **RFC 9728 metadata** - protected resource discovery document
//!
//! ## Architecture
//!
//! - [`server`] - [`ResourceServer`], bearer extraction and challenges
//! - [`validator`] - [`TokenValidator`] and its token cache
//! - [`jwt`] - JWKS client and signature verification
//! - [`tokeninfo`] - Google tokeninfo client
//! - [`context`] - [`Principal`] extraction and the default grant
//! - [`employee`] - [`EmployeeResolver`] and the [`RecordStore`] seam
//! - [`scopes`] - scope catalogue and the any-of gate
//! - [`metadata`] - [`ProtectedResourceMetadata`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use odoo_mcp_auth::{GrantPolicy, Principal, ProtectedResourceMetadata, ResourceServer, TokenValidator, ValidatorConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let metadata = ProtectedResourceMetadata::builder("https://mcp.example.com")
//!     .authorization_server("https://accounts.google.com")
//!     .build()?;
//! let validator = TokenValidator::builder(ValidatorConfig::google("client-id")).build()?;
//! let server = ResourceServer::new(metadata, validator);
//!
//! let claims = server.authenticate(Some("Bearer ya29.example")).await?;
//! let principal = Principal::from_claims(claims, &GrantPolicy::google(Some("example.com".into())));
//! if principal.is_authorized(&["odoo.read"]) {
//!     println!("{} may read", principal.subject);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards Compliance
//!
//! - **RFC 6750** - Bearer Token Usage
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7517** - JSON Web Key (JWK)
//! - **RFC 9728** - OAuth 2.0 Protected Resource Metadata

pub mod cache;
pub mod claims;
pub mod config;
pub mod context;
pub mod employee;
pub mod error;
pub mod jwt;
pub mod metadata;
pub mod scopes;
pub mod server;
pub mod tokeninfo;
pub mod validator;

#[doc(inline)]
pub use cache::{Clock, ExpiringCache, MemoryCache, SharedCache, SystemClock, TokenHash};
#[doc(inline)]
pub use claims::{Audience, ValidatedClaims};
#[doc(inline)]
pub use config::{AuthorityKind, ValidatorConfig};
#[doc(inline)]
pub use context::{GrantPolicy, Principal};
#[doc(inline)]
pub use employee::{EmployeeRecord, EmployeeResolver, Record, RecordRef, RecordStore};
#[doc(inline)]
pub use error::{ResolveError, StoreError, TokenError};
#[doc(inline)]
pub use metadata::{METADATA_PATH, MetadataError, ProtectedResourceMetadata};
#[doc(inline)]
pub use scopes::{ScopeSet, is_authorized};
#[doc(inline)]
pub use server::{ResourceServer, WwwAuthenticate, extract_bearer_token};
#[doc(inline)]
pub use validator::{TokenCache, TokenValidator, TokenValidatorBuilder};
