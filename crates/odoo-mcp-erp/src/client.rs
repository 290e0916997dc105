//! Async Odoo client over the JSON-RPC endpoint
//!
//! Every call is a `POST {url}/jsonrpc` carrying
//! `{"method": "call", "params": {"service", "method", "args"}}`. The `common`
//! service handles login and version, the `object` service runs
//! `execute_kw` on models.

use crate::error::{Fault, OdooError, OdooErrorKind, OdooResult};
use odoo_mcp_auth::Record;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Default timeout for a single Odoo call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size for [`OdooClient::search_read`].
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Connection settings.
#[derive(Clone)]
pub struct OdooConfig {
    /// Base URL, e.g. `https://erp.example.com`
    pub url: String,
    /// Database name
    pub database: String,
    /// Service account login
    pub username: String,
    /// API key, or the password when no key is issued
    pub credential: SecretString,
    /// Per-call timeout
    pub timeout: Duration,
}

impl OdooConfig {
    /// Settings with the default timeout.
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        credential: SecretString,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            credential,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for OdooConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("credential", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Paging and projection for [`OdooClient::search_read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Fields to return; empty means Odoo's default set
    pub fields: Vec<String>,
    /// Maximum rows
    pub limit: usize,
    /// Rows to skip
    pub offset: usize,
    /// Sort specification, e.g. `"date_from desc"`
    pub order: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            order: None,
        }
    }
}

impl SearchOptions {
    /// Project to `fields`.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skip `offset` rows.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sort by `order`.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    fn to_kwargs(&self) -> Value {
        let mut kwargs = Map::new();
        kwargs.insert("limit".into(), json!(self.limit));
        kwargs.insert("offset".into(), json!(self.offset));
        if !self.fields.is_empty() {
            kwargs.insert("fields".into(), json!(self.fields));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".into(), json!(order));
        }
        Value::Object(kwargs)
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Fault>,
}

/// Odoo client authenticated as one service account.
///
/// The uid is obtained lazily on the first model call. Concurrent first
/// callers share a single login; a failed login is retried by the next call.
pub struct OdooClient {
    config: OdooConfig,
    endpoint: String,
    http: reqwest::Client,
    uid: OnceCell<i64>,
    next_id: AtomicU64,
}

impl fmt::Debug for OdooClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooClient")
            .field("endpoint", &self.endpoint)
            .field("database", &self.config.database)
            .field("authenticated", &self.uid.initialized())
            .finish()
    }
}

impl OdooClient {
    /// Create a client. No network traffic happens until the first call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: OdooConfig) -> OdooResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OdooError::new(OdooErrorKind::Connection, e.to_string()))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Create a client on a preconfigured HTTP client.
    pub fn with_http_client(config: OdooConfig, http: reqwest::Client) -> Self {
        let endpoint = format!("{}/jsonrpc", config.url);
        Self {
            config,
            endpoint,
            http,
            uid: OnceCell::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Connection settings.
    pub fn config(&self) -> &OdooConfig {
        &self.config
    }

    /// Log in and return the service account's uid, reusing a cached one.
    ///
    /// # Errors
    ///
    /// [`OdooErrorKind::AccessDenied`] when Odoo rejects the credentials,
    /// otherwise the transport or fault error.
    pub async fn authenticate(&self) -> OdooResult<i64> {
        self.uid.get_or_try_init(|| self.login()).await.copied()
    }

    async fn login(&self) -> OdooResult<i64> {
        let args = json!([
            self.config.database,
            self.config.username,
            self.config.credential.expose_secret(),
            {}
        ]);
        let result: Value = self.call("common", "authenticate", args).await?;
        match result.as_i64() {
            Some(uid) if uid > 0 => {
                info!(database = %self.config.database, username = %self.config.username, uid, "Authenticated with Odoo");
                Ok(uid)
            }
            _ => {
                error!(username = %self.config.username, "Odoo rejected service credentials");
                Err(OdooError::new(
                    OdooErrorKind::AccessDenied,
                    "Authentication failed - check credentials",
                ))
            }
        }
    }

    /// Server version information.
    ///
    /// # Errors
    ///
    /// Transport or fault error.
    pub async fn version(&self) -> OdooResult<Value> {
        self.call("common", "version", json!([])).await
    }

    /// Run `method` on `model` with positional `args` and keyword `kwargs`.
    ///
    /// # Errors
    ///
    /// Login failure, transport failure or the fault Odoo raised.
    pub async fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> OdooResult<Value> {
        let uid = self.authenticate().await?;
        debug!(model, method, "Odoo execute_kw");
        let args = json!([
            self.config.database,
            uid,
            self.config.credential.expose_secret(),
            model,
            method,
            args,
            kwargs
        ]);
        self.call("object", "execute_kw", args).await
    }

    /// Records of `model` matching `domain`.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn search_read(&self, model: &str, domain: Value, options: &SearchOptions) -> OdooResult<Vec<Record>> {
        let value = self
            .execute_kw(model, "search_read", json!([domain]), options.to_kwargs())
            .await?;
        decode(value)
    }

    /// Records of `model` with the given ids.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> OdooResult<Vec<Record>> {
        let kwargs = if fields.is_empty() {
            json!({})
        } else {
            json!({ "fields": fields })
        };
        let value = self.execute_kw(model, "read", json!([ids]), kwargs).await?;
        decode(value)
    }

    /// Create one record and return its id.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn create(&self, model: &str, values: Value) -> OdooResult<i64> {
        let value = self.execute_kw(model, "create", json!([values]), json!({})).await?;
        decode(value)
    }

    /// Update records.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn write(&self, model: &str, ids: &[i64], values: Value) -> OdooResult<bool> {
        let value = self
            .execute_kw(model, "write", json!([ids, values]), json!({}))
            .await?;
        decode(value)
    }

    /// Delete records.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn unlink(&self, model: &str, ids: &[i64]) -> OdooResult<bool> {
        let value = self.execute_kw(model, "unlink", json!([ids]), json!({})).await?;
        decode(value)
    }

    /// Number of records matching `domain`.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn search_count(&self, model: &str, domain: Value) -> OdooResult<i64> {
        let value = self
            .execute_kw(model, "search_count", json!([domain]), json!({}))
            .await?;
        decode(value)
    }

    /// Field definitions of `model`, optionally limited to `attributes`.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_kw`].
    pub async fn fields_get(&self, model: &str, attributes: &[&str]) -> OdooResult<Map<String, Value>> {
        let kwargs = if attributes.is_empty() {
            json!({})
        } else {
            json!({ "attributes": attributes })
        };
        let value = self.execute_kw(model, "fields_get", json!([]), kwargs).await?;
        decode(value)
    }

    async fn call<T: DeserializeOwned>(&self, service: &str, method: &str, args: Value) -> OdooResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams { service, method, args },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(service, method, error = %e, "Odoo request failed");
                OdooError::from_reqwest(&e)
            })?;

        let status = response.status();
        if status.is_server_error() {
            error!(service, method, status = %status, "Odoo returned server error");
            return Err(OdooError::new(
                OdooErrorKind::Server,
                format!("Odoo returned status {status}"),
            ));
        }
        if !status.is_success() {
            return Err(OdooError::new(
                OdooErrorKind::Protocol,
                format!("Odoo returned status {status}"),
            ));
        }

        let body: RpcResponse = response.json().await.map_err(|e| OdooError::from_reqwest(&e))?;
        if let Some(fault) = body.error {
            let err = OdooError::from_fault(&fault);
            error!(service, method, kind = err.kind.code(), message = %err.message, "Odoo fault");
            return Err(err);
        }
        decode(body.result.unwrap_or(Value::Null))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> OdooResult<T> {
    serde_json::from_value(value)
        .map_err(|e| OdooError::new(OdooErrorKind::Protocol, format!("unexpected result shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_options_kwargs() {
        let options = SearchOptions::default()
            .fields(["id", "name"])
            .limit(5)
            .order("name asc");
        assert_eq!(
            options.to_kwargs(),
            json!({"limit": 5, "offset": 0, "fields": ["id", "name"], "order": "name asc"})
        );
        assert_eq!(SearchOptions::default().to_kwargs(), json!({"limit": 100, "offset": 0}));
    }

    #[test]
    fn test_config_trims_url_and_redacts_secret() {
        let config = OdooConfig::new(
            "https://erp.example.com/",
            "prod",
            "svc",
            SecretString::new("k3y".to_string()),
        );
        assert_eq!(config.url, "https://erp.example.com");
        assert!(!format!("{config:?}").contains("k3y"));
    }
}
