//! Server configuration management
//!
//! Settings come from an optional file (TOML, YAML or JSON, picked by
//! extension) overlaid with `ODOO_MCP_*` environment variables, where `__`
//! separates nested keys:
//!
//! ```text
//! ODOO_MCP_HTTP__PORT=9000
//! ODOO_MCP_ODOO__API_KEY=...
//! ODOO_MCP_OAUTH__PROVIDER=custom
//! ```
//!
//! Everything the request path needs that depends on the provider (audience,
//! advertised scopes, key-distribution URI, authority kind) is derived here,
//! once.

use odoo_mcp_auth::config::{GOOGLE_ISSUER, ValidatorConfig};
use odoo_mcp_auth::metadata::MetadataError;
use odoo_mcp_auth::scopes::{IDENTITY_SCOPES, all_scopes};
use odoo_mcp_auth::{AuthorityKind, GrantPolicy, ProtectedResourceMetadata};
use odoo_mcp_erp::OdooConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ODOO_MCP";

/// Complete server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and request limits
    pub http: HttpConfig,
    /// Odoo connection
    pub odoo: OdooSettings,
    /// Token validation and identity mapping
    pub oauth: OAuthConfig,
    /// Logging
    pub logging: LoggingConfig,
    /// Development conveniences such as localhost CORS origins
    pub debug: bool,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

/// Odoo connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OdooSettings {
    /// Base URL
    pub url: String,
    /// Database name
    pub database: String,
    /// Service account login
    pub username: String,
    /// API key (preferred)
    pub api_key: Option<SecretString>,
    /// Password, used when no API key is set
    pub password: Option<SecretString>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// Which authority issues accepted tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// Google ID tokens and opaque access tokens
    Google,
    /// A custom authorization server issuing JWT access tokens
    Custom,
}

/// OAuth configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Token authority
    pub provider: OAuthProvider,
    /// OAuth client id (the audience for Google)
    pub client_id: Option<String>,
    /// Expected token issuer
    pub issuer: String,
    /// Authorization server advertised in metadata
    pub authorization_server: String,
    /// Key-distribution endpoint override
    pub jwks_uri: Option<String>,
    /// Tokeninfo endpoint override
    pub tokeninfo_endpoint: Option<String>,
    /// Canonical identifier of this resource server
    pub resource_identifier: String,
    /// Email domain whose federated users get broad write access
    pub internal_domain: Option<String>,
    /// Ceiling on validated-token cache lifetime
    pub token_cache_ttl_secs: u64,
    /// Employee lookup cache lifetime
    pub employee_cache_ttl_secs: u64,
    /// Key set lifetime
    pub jwks_cache_ttl_secs: u64,
    /// Expiry tolerance
    pub clock_skew_secs: u64,
    /// Skip token validation entirely (local development only)
    pub dev_mode: bool,
    /// Identity injected in dev mode
    pub dev_user_email: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or filter directive, used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Write to daily-rotated files in this directory instead of stderr
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            odoo: OdooSettings::default(),
            oauth: OAuthConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for OdooSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            database: "odoo".to_string(),
            username: "admin".to_string(),
            api_key: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            provider: OAuthProvider::Google,
            client_id: None,
            issuer: GOOGLE_ISSUER.to_string(),
            authorization_server: GOOGLE_ISSUER.to_string(),
            jwks_uri: None,
            tokeninfo_endpoint: None,
            resource_identifier: "http://localhost:8080".to_string(),
            internal_domain: None,
            token_cache_ttl_secs: 300,
            employee_cache_ttl_secs: 300,
            jwks_cache_ttl_secs: 3600,
            clock_skew_secs: 0,
            dev_mode: false,
            dev_user_email: "dev@example.com".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            directory: None,
            file_prefix: "odoo-mcp-server".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// Resource identifier or metadata problem
    #[error("Invalid OAuth configuration: {0}")]
    Metadata(#[from] MetadataError),

    /// Odoo URL does not parse
    #[error("Invalid Odoo URL {url}: {reason}")]
    InvalidOdooUrl {
        /// The configured value
        url: String,
        /// Parser message
        reason: String,
    },

    /// Google needs the OAuth client id as token audience
    #[error("oauth.client_id is required for the google provider")]
    MissingClientId,

    /// Neither an API key nor a password is configured
    #[error("odoo.api_key or odoo.password is required")]
    MissingOdooCredential,
}

impl ServerConfig {
    /// Load from an optional file plus `ODOO_MCP_*` environment variables,
    /// then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist or has an unsupported extension
    /// - A value cannot be parsed
    /// - [`Self::validate`] rejects the result
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, environment(ENV_PREFIX))
    }

    /// Like [`Self::load`] with an explicit environment source.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("yaml" | "yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(ConfigError::UnsupportedFormat),
            };
            let name = path.to_str().ok_or(ConfigError::UnsupportedFormat)?;
            builder = builder.add_source(File::new(name, format));
        }

        // Environment variables override file settings
        let config: Self = builder.add_source(environment).build()?.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would otherwise fail at request time.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Metadata`] for a non-canonical resource identifier
    /// - [`ConfigError::InvalidOdooUrl`] when the Odoo URL does not parse
    /// - [`ConfigError::MissingClientId`] for Google without a client id,
    ///   unless dev mode disables token validation
    /// - [`ConfigError::MissingOdooCredential`] without API key or password
    pub fn validate(&self) -> Result<(), ConfigError> {
        odoo_mcp_auth::metadata::canonical_resource_uri(&self.oauth.resource_identifier)?;

        Url::parse(&self.odoo.url).map_err(|e| ConfigError::InvalidOdooUrl {
            url: self.odoo.url.clone(),
            reason: e.to_string(),
        })?;

        if self.oauth.provider == OAuthProvider::Google
            && !self.oauth.dev_mode
            && self.oauth.client_id.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingClientId);
        }

        if self.odoo.api_key.is_none() && self.odoo.password.is_none() {
            return Err(ConfigError::MissingOdooCredential);
        }
        Ok(())
    }

    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    /// Federated for Google, custom otherwise.
    pub fn authority_kind(&self) -> AuthorityKind {
        self.validator_config().authority
    }

    /// Canonical form of `oauth.resource_identifier`, the value advertised in
    /// the metadata document. Falls back to the raw value when it does not
    /// parse; [`Self::validate`] rejects that case at load time.
    pub fn resource_identifier(&self) -> String {
        let raw = &self.oauth.resource_identifier;
        odoo_mcp_auth::metadata::canonical_resource_uri(raw).unwrap_or_else(|_| raw.clone())
    }

    /// Audience tokens must carry: the client id for Google, this
    /// resource's canonical identifier for a custom server.
    pub fn audience(&self) -> String {
        match self.oauth.provider {
            OAuthProvider::Google => self.oauth.client_id.clone().unwrap_or_default(),
            OAuthProvider::Custom => self.resource_identifier(),
        }
    }

    /// Scopes listed in the metadata document. Google only understands the
    /// identity scopes, so only those are advertised for it.
    pub fn advertised_scopes(&self) -> Vec<String> {
        match self.oauth.provider {
            OAuthProvider::Google => IDENTITY_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            OAuthProvider::Custom => all_scopes().into_iter().collect(),
        }
    }

    /// Token validator settings.
    pub fn validator_config(&self) -> ValidatorConfig {
        let oauth = &self.oauth;
        let mut config = match oauth.provider {
            OAuthProvider::Google => ValidatorConfig::google(self.audience()),
            OAuthProvider::Custom => ValidatorConfig::custom(&oauth.issuer, self.audience()),
        };
        if let Some(jwks_uri) = &oauth.jwks_uri {
            config = config.with_jwks_uri(jwks_uri);
        }
        if let Some(endpoint) = &oauth.tokeninfo_endpoint {
            config = config.with_tokeninfo_endpoint(endpoint);
        }
        config
            .with_token_cache_ttl(Duration::from_secs(oauth.token_cache_ttl_secs))
            .with_jwks_cache_ttl(Duration::from_secs(oauth.jwks_cache_ttl_secs))
            .with_clock_skew(Duration::from_secs(oauth.clock_skew_secs))
    }

    /// RFC 9728 metadata served at the well-known path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Metadata`] for a bad resource identifier.
    pub fn metadata(&self) -> Result<ProtectedResourceMetadata, ConfigError> {
        let algorithms: Vec<String> = self
            .authority_kind()
            .allowed_algorithms()
            .iter()
            .map(|alg| format!("{alg:?}"))
            .collect();
        let resource = odoo_mcp_auth::metadata::canonical_resource_uri(&self.oauth.resource_identifier)?;
        Ok(ProtectedResourceMetadata::builder(resource)
            .authorization_server(&self.oauth.authorization_server)
            .scopes(self.advertised_scopes())
            .signing_algorithms(algorithms)
            .build()?)
    }

    /// Inputs to the federated default grant.
    pub fn grant_policy(&self) -> GrantPolicy {
        GrantPolicy::google(self.oauth.internal_domain.clone())
    }

    /// Employee lookup cache lifetime.
    pub fn employee_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth.employee_cache_ttl_secs)
    }

    /// Odoo client settings, preferring the API key over the password.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingOdooCredential`] when neither is set.
    pub fn odoo_config(&self) -> Result<OdooConfig, ConfigError> {
        let credential = self
            .odoo
            .api_key
            .clone()
            .or_else(|| self.odoo.password.clone())
            .ok_or(ConfigError::MissingOdooCredential)?;
        Ok(OdooConfig::new(
            &self.odoo.url,
            &self.odoo.database,
            &self.odoo.username,
            credential,
        )
        .with_timeout(Duration::from_secs(self.odoo.timeout_secs)))
    }
}

/// Environment source for `prefix`: `{PREFIX}_SECTION__KEY`.
pub fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
