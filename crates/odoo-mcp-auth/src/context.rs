//! Principal extraction from validated claims
//!
//! # Federated default grant
//!
//! Google cannot be configured to put custom scopes into its tokens, so a
//! verified Google identity is used as a proxy for a default trust level:
//!
//! | Condition                                              | Granted                          |
//! |--------------------------------------------------------|----------------------------------|
//! | token carries any scope                                | exactly those scopes             |
//! | no scope, federated issuer, verified non-empty email   | [`FEDERATED_DEFAULT_SCOPES`]     |
//! | ... and the email domain is the internal domain        | plus [`INTERNAL_EXTRA_SCOPES`]   |
//! | otherwise                                              | nothing                          |

use crate::claims::ValidatedClaims;
use crate::config::GOOGLE_ISSUER;
use crate::scopes::{
    FEDERATED_DEFAULT_SCOPES, INTERNAL_EXTRA_SCOPES, ScopeSet, is_authorized, parse_scopes,
};
use std::sync::Arc;
use tracing::info;

/// Inputs to the federated default-grant rule.
#[derive(Debug, Clone)]
pub struct GrantPolicy {
    /// Issuer whose scope-less tokens qualify for the default grant
    pub federated_issuer: String,
    /// Email domain whose users also get broad write access
    pub internal_domain: Option<String>,
}

impl GrantPolicy {
    /// Policy for Google with an optional internal domain.
    pub fn google(internal_domain: Option<String>) -> Self {
        Self {
            federated_issuer: GOOGLE_ISSUER.to_string(),
            internal_domain: internal_domain.map(|d| d.trim_start_matches('@').to_ascii_lowercase()),
        }
    }

    fn is_internal(&self, email: &str) -> bool {
        let Some(domain) = &self.internal_domain else {
            return false;
        };
        email
            .rsplit_once('@')
            .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
    }
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self::google(None)
    }
}

/// The authenticated caller for the rest of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Subject identifier
    pub subject: String,
    /// Email, falling back to the subject when the token has none
    pub email: Option<String>,
    /// Granted scopes
    pub scopes: ScopeSet,
    /// Employee id asserted by the custom authorization server
    pub employee_id: Option<i64>,
    /// Claims the principal was derived from
    pub claims: Arc<ValidatedClaims>,
}

impl Principal {
    /// Derive a principal from validated claims.
    ///
    /// Pure: no I/O and no failure mode.
    pub fn from_claims(claims: Arc<ValidatedClaims>, policy: &GrantPolicy) -> Self {
        let mut scopes = parse_scopes(claims.scope.as_deref());
        let federated = claims.iss == policy.federated_issuer;

        if scopes.is_empty() && federated && claims.has_verified_email() {
            let email = claims.email.as_deref().unwrap_or_default();
            scopes.extend(FEDERATED_DEFAULT_SCOPES.iter().map(|s| (*s).to_string()));
            if policy.is_internal(email) {
                scopes.extend(INTERNAL_EXTRA_SCOPES.iter().map(|s| (*s).to_string()));
                info!(email = %email, "Granted default and internal scopes to federated user");
            } else {
                info!(email = %email, "Granted default scopes to federated user");
            }
        }

        let employee_id = if federated { None } else { claims.employee_id };
        let email = claims
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| Some(claims.sub.clone()));

        Self {
            subject: claims.sub.clone(),
            email,
            scopes,
            employee_id,
            claims,
        }
    }

    /// Principal with every given scope and no token behind it, used when
    /// authentication is disabled for local development.
    pub fn development(email: impl Into<String>, scopes: ScopeSet) -> Self {
        let email = email.into();
        let claims = ValidatedClaims {
            iss: "dev".to_string(),
            sub: "dev-user".to_string(),
            aud: crate::claims::Audience::Single("dev".to_string()),
            exp: u64::MAX,
            iat: None,
            email: Some(email.clone()),
            email_verified: Some(true),
            scope: None,
            azp: None,
            employee_id: None,
            extra: Default::default(),
        };
        Self {
            subject: claims.sub.clone(),
            email: Some(email),
            scopes,
            employee_id: None,
            claims: Arc::new(claims),
        }
    }

    /// Whether the principal passes the gate for `required`.
    pub fn is_authorized<S: AsRef<str>>(&self, required: &[S]) -> bool {
        is_authorized(required, &self.scopes)
    }
}
