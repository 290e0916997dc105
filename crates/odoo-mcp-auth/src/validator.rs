//! Bearer-token validation with result caching
//!
//! [`TokenValidator::validate`] is the single entry point:
//!
//! 1. hash the token and consult the token cache; a live entry is returned
//!    without any network call or signature check
//! 2. three-segment tokens go through [`JwtVerifier`]; other tokens are
//!    treated as opaque and, for the federated provider only, checked with
//!    the tokeninfo endpoint
//! 3. federated-specific checks (`azp`, unverified email warning)
//! 4. cache the claims until `min(exp, now + ceiling)`
//!
//! The clock is read once per call and that reading is used for every
//! expiry comparison in the call.

use crate::cache::{
    Clock, ExpiringCache, MemoryCache, SharedCache, SystemClock, TokenHash, bounded_expiry,
    unix_seconds,
};
use crate::claims::ValidatedClaims;
use crate::config::{AuthorityKind, ValidatorConfig};
use crate::error::TokenError;
use crate::jwt::{JwksCache, JwtVerifier};
use crate::tokeninfo::TokenInfoClient;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Cache of validated claims keyed by token hash.
pub type TokenCache = SharedCache<TokenHash, Arc<ValidatedClaims>>;

/// Validates bearer tokens for one configured authority.
#[derive(Clone)]
pub struct TokenValidator {
    config: Arc<ValidatorConfig>,
    cache: TokenCache,
    jwt: JwtVerifier,
    tokeninfo: Option<TokenInfoClient>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("federated", &self.config.authority.is_federated())
            .field("cached_tokens", &self.cache.len())
            .finish()
    }
}

impl TokenValidator {
    /// Start building a validator for `config`.
    pub fn builder(config: ValidatorConfig) -> TokenValidatorBuilder {
        TokenValidatorBuilder {
            config,
            cache: None,
            jwks_cache: None,
            http_client: None,
            clock: None,
        }
    }

    /// Configuration this validator was built with.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `token` and return its claims.
    ///
    /// # Errors
    ///
    /// - [`TokenError::TokenExpired`], [`TokenError::InvalidIssuer`],
    ///   [`TokenError::InvalidAudience`], [`TokenError::InvalidToken`] for
    ///   the respective violations
    /// - [`TokenError::Validation`] for malformed input
    /// - [`TokenError::Upstream`] when the key set or tokeninfo endpoint
    ///   cannot be reached
    pub async fn validate(&self, token: &str) -> Result<Arc<ValidatedClaims>, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Validation("empty token".to_string()));
        }

        let now_at = self.clock.now();
        let now = unix_seconds(now_at);
        let hash = TokenHash::of(token);

        if let Some(claims) = self.cache.get(&hash, now_at) {
            debug!(token_hash = %hash, "Token cache hit");
            return Ok(claims);
        }

        let claims = if is_structured(token) {
            self.jwt
                .verify(token, now, self.config.clock_skew.as_secs())
                .await?
        } else {
            match &self.tokeninfo {
                Some(tokeninfo) => tokeninfo
                    .lookup(token)
                    .await?
                    .into_claims(&self.config.issuer, &self.config.audience, now)?,
                None => return Err(TokenError::Validation("invalid JWT format".to_string())),
            }
        };

        self.check_federated(&claims)?;

        let claims = Arc::new(claims);
        let token_expiry = SystemTime::UNIX_EPOCH
            .checked_add(Duration::from_secs(claims.exp))
            .unwrap_or(now_at + self.config.token_cache_ttl);
        let expires_at = bounded_expiry(now_at, token_expiry, self.config.token_cache_ttl);
        self.cache.insert(hash, Arc::clone(&claims), expires_at, now_at);
        Ok(claims)
    }

    fn check_federated(&self, claims: &ValidatedClaims) -> Result<(), TokenError> {
        let AuthorityKind::Federated {
            authorized_party, ..
        } = &self.config.authority
        else {
            return Ok(());
        };

        if let (Some(expected), Some(azp)) = (authorized_party, &claims.azp)
            && azp != expected
        {
            return Err(TokenError::InvalidToken(format!(
                "invalid authorized party: {azp}"
            )));
        }

        if claims.email_verified != Some(true) {
            warn!(email = ?claims.email, subject = %claims.sub, "Federated token email not verified");
        }
        Ok(())
    }
}

fn is_structured(token: &str) -> bool {
    token.split('.').count() == 3
}

/// Builder for [`TokenValidator`].
pub struct TokenValidatorBuilder {
    config: ValidatorConfig,
    cache: Option<TokenCache>,
    jwks_cache: Option<JwksCache>,
    http_client: Option<reqwest::Client>,
    clock: Option<Arc<dyn Clock>>,
}

impl TokenValidatorBuilder {
    /// Use a shared token cache instead of a private in-memory one.
    pub fn token_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a shared JWKS registry.
    pub fn jwks_cache(mut self, jwks_cache: JwksCache) -> Self {
        self.jwks_cache = Some(jwks_cache);
        self
    }

    /// Use a preconfigured HTTP client. It should carry a request timeout.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the validator.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be constructed.
    pub fn build(self) -> Result<TokenValidator, reqwest::Error> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.config.http_timeout)
                .build()?,
        };
        let jwks_cache = self
            .jwks_cache
            .unwrap_or_else(|| JwksCache::new(http_client.clone(), self.config.jwks_cache_ttl));
        let jwt = JwtVerifier::new(&self.config, jwks_cache.client_for(&self.config.jwks_uri));
        let tokeninfo = match &self.config.authority {
            AuthorityKind::Federated {
                tokeninfo_endpoint, ..
            } => Some(TokenInfoClient::new(tokeninfo_endpoint.clone(), http_client)),
            AuthorityKind::Custom => None,
        };

        let cache: TokenCache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::new()),
        };

        Ok(TokenValidator {
            config: Arc::new(self.config),
            cache,
            jwt,
            tokeninfo,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}
