//! Signature and claim verification for structured (JWT) tokens

use super::jwks::JwksClient;
use crate::claims::ValidatedClaims;
use crate::config::{AuthorityKind, ValidatorConfig};
use crate::error::TokenError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verifies JWTs against one issuer's published keys.
///
/// Checks, in order:
/// 1. the header decodes and its `alg` is on the authority's allow-list
/// 2. a key matching `kid` exists (one forced JWKS refresh on a miss)
/// 3. the signature verifies
/// 4. `iss` and `aud` match exactly and the required claims are present
/// 5. `exp` is not past, measured against the caller's `now`
#[derive(Clone)]
pub struct JwtVerifier {
    issuer: String,
    audience: String,
    authority: AuthorityKind,
    jwks: Arc<JwksClient>,
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jwks_uri", &self.jwks.jwks_uri())
            .field("allowed_algorithms", &self.authority.allowed_algorithms())
            .finish()
    }
}

impl JwtVerifier {
    /// Create a verifier for `config` using the given key source.
    pub fn new(config: &ValidatorConfig, jwks: Arc<JwksClient>) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            authority: config.authority.clone(),
            jwks,
        }
    }

    /// Verify `token` and return its claims.
    ///
    /// `now` is seconds since the epoch, read once by the caller.
    ///
    /// # Errors
    ///
    /// - [`TokenError::TokenExpired`], [`TokenError::InvalidIssuer`],
    ///   [`TokenError::InvalidAudience`] for the respective claim failures
    /// - [`TokenError::InvalidToken`] for disallowed algorithms, unknown keys,
    ///   bad signatures and missing claims
    /// - [`TokenError::Validation`] for tokens that do not decode
    /// - [`TokenError::Upstream`] if the key set cannot be fetched
    pub async fn verify(
        &self,
        token: &str,
        now: u64,
        clock_skew_secs: u64,
    ) -> Result<ValidatedClaims, TokenError> {
        let header = decode_header(token)
            .map_err(|e| TokenError::Validation(format!("malformed token header: {e}")))?;

        if !self.authority.allowed_algorithms().contains(&header.alg) {
            warn!(algorithm = ?header.alg, issuer = %self.issuer, "Rejected token with disallowed algorithm");
            return Err(TokenError::InvalidToken(format!(
                "algorithm {:?} is not allowed",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(self.authority.required_claims());
        // Expiry is compared below against the caller's clock reading.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<ValidatedClaims>(token, &key, &validation)
            .map_err(|e| self.map_decode_error(e))?
            .claims;

        if claims.exp.saturating_add(clock_skew_secs) <= now {
            return Err(TokenError::TokenExpired);
        }

        for claim in self.authority.required_claims() {
            if *claim == "email" && claims.email.as_deref().is_none_or(str::is_empty) {
                return Err(TokenError::InvalidToken(
                    "missing required claim: email".to_string(),
                ));
            }
        }

        debug!(issuer = %claims.iss, subject = %claims.sub, "JWT verified");
        Ok(claims)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, TokenError> {
        let jwks = self.jwks.get_jwks().await?;
        if let Some(jwk) = select_key(&jwks, kid)? {
            return to_decoding_key(jwk);
        }

        // The issuer may have rotated keys since the set was cached
        debug!(kid = ?kid, jwks_uri = %self.jwks.jwks_uri(), "Signing key not cached, refreshing JWKS");
        let jwks = self.jwks.refresh().await?;
        match select_key(&jwks, kid)? {
            Some(jwk) => to_decoding_key(jwk),
            None => Err(TokenError::InvalidToken(format!(
                "no signing key matches kid {}",
                kid.unwrap_or_default()
            ))),
        }
    }

    fn map_decode_error(&self, error: jsonwebtoken::errors::Error) -> TokenError {
        let mapped = match error.kind() {
            ErrorKind::ExpiredSignature => TokenError::TokenExpired,
            ErrorKind::InvalidIssuer => TokenError::InvalidIssuer {
                expected: self.issuer.clone(),
            },
            ErrorKind::InvalidAudience => TokenError::InvalidAudience {
                expected: self.audience.clone(),
            },
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::InvalidToken(format!("missing required claim: {claim}"))
            }
            ErrorKind::InvalidSignature => {
                TokenError::InvalidToken("signature verification failed".to_string())
            }
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                TokenError::InvalidToken("algorithm does not match signing key".to_string())
            }
            ErrorKind::ImmatureSignature => {
                TokenError::InvalidToken("token is not yet valid".to_string())
            }
            ErrorKind::Json(_) => TokenError::InvalidToken(format!("invalid claims: {error}")),
            _ => TokenError::Validation(error.to_string()),
        };
        warn!(error = %error, issuer = %self.issuer, "JWT validation failed");
        mapped
    }
}

fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<Option<&'a Jwk>, TokenError> {
    match kid {
        Some(kid) => Ok(jwks.find(kid)),
        None if jwks.keys.len() == 1 => Ok(jwks.keys.first()),
        None => Err(TokenError::InvalidToken(
            "token has no kid and the key set holds several keys".to_string(),
        )),
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, TokenError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| TokenError::Validation(format!("unusable signing key: {e}")))
}
