//! Shared application state, built once at startup

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use odoo_mcp_auth::cache::TokenHash;
use odoo_mcp_auth::scopes::all_scopes;
use odoo_mcp_auth::{
    EmployeeRecord, EmployeeResolver, GrantPolicy, MemoryCache, Principal, RecordStore, ResourceServer,
    TokenValidator, ValidatedClaims,
};
use odoo_mcp_erp::OdooClient;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Token cache with a concrete type so it can be purged.
pub type TokenCacheHandle = Arc<MemoryCache<TokenHash, Arc<ValidatedClaims>>>;

/// Employee cache with a concrete type so it can be purged.
pub type EmployeeCacheHandle = Arc<MemoryCache<String, EmployeeRecord>>;

/// Everything a request handler needs. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Token validation and challenges
    pub resource_server: ResourceServer,
    /// Federated default-grant inputs
    pub policy: Arc<GrantPolicy>,
    /// Principal to employee mapping
    pub resolver: Arc<EmployeeResolver>,
    /// Odoo service-account client
    pub odoo: Arc<OdooClient>,
    /// Injected identity when token validation is disabled
    pub dev_principal: Option<Arc<Principal>>,
    token_cache: TokenCacheHandle,
    employee_cache: EmployeeCacheHandle,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resource_server", &self.resource_server)
            .field("dev_mode", &self.dev_principal.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build validator, resolver and Odoo client from `config`.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Config`] if the metadata cannot be built
    /// - [`ServerError::Internal`] if an HTTP client cannot be created
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let odoo_config = config.odoo_config()?;
        let odoo = OdooClient::new(odoo_config)
            .map_err(|e| ServerError::Internal(format!("Odoo client: {e}")))?;
        Self::with_odoo(config, Arc::new(odoo))
    }

    /// Like [`Self::from_config`] with a prebuilt Odoo client.
    ///
    /// # Errors
    ///
    /// See [`Self::from_config`].
    pub fn with_odoo(config: ServerConfig, odoo: Arc<OdooClient>) -> ServerResult<Self> {
        let token_cache: TokenCacheHandle = Arc::new(MemoryCache::new());
        let employee_cache: EmployeeCacheHandle = Arc::new(MemoryCache::new());

        let validator = TokenValidator::builder(config.validator_config())
            .token_cache(token_cache.clone())
            .build()
            .map_err(|e| ServerError::Internal(format!("identity provider HTTP client: {e}")))?;
        let resource_server = ResourceServer::new(config.metadata()?, validator);

        let store: Arc<dyn RecordStore> = odoo.clone();
        let resolver = EmployeeResolver::new(store)
            .with_cache(employee_cache.clone(), config.employee_cache_ttl());

        let dev_principal = config.oauth.dev_mode.then(|| {
            warn!(
                email = %config.oauth.dev_user_email,
                "OAuth dev mode enabled: token validation is DISABLED"
            );
            Arc::new(Principal::development(&config.oauth.dev_user_email, all_scopes()))
        });

        Ok(Self {
            policy: Arc::new(config.grant_policy()),
            config: Arc::new(config),
            resource_server,
            resolver: Arc::new(resolver),
            odoo,
            dev_principal,
            token_cache,
            employee_cache,
        })
    }

    /// Drop expired token and employee cache entries.
    pub fn purge_expired(&self) {
        let now = SystemTime::now();
        self.token_cache.purge_expired(now);
        self.employee_cache.purge_expired(now);
    }
}
