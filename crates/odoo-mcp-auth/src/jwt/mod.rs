//! Structured-token (JWT) validation
//!
//! ```text
//! ┌─────────────┐      ┌──────────────┐      ┌────────────────┐
//! │ JwtVerifier │─────▶│  JwksClient  │─────▶│ JWKS endpoint  │
//! │  alg/kid    │      │ (TTL cache)  │      │ (issuer keys)  │
//! │  iss/aud    │      └──────────────┘      └────────────────┘
//! │  exp        │             ▲
//! └─────────────┘             │ shared per endpoint
//!                      ┌──────────────┐
//!                      │  JwksCache   │
//!                      └──────────────┘
//! ```

mod jwks;
mod verifier;

pub use jwks::{JwksCache, JwksClient, MIN_REFRESH_INTERVAL};
pub use verifier::JwtVerifier;
