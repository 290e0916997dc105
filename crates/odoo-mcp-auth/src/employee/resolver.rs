//! Multi-strategy employee resolution with a TTL cache
//!
//! Strategies, first success wins:
//!
//! 1. `odoo_employee_id` claim from the custom authorization server: read
//!    that record directly
//! 2. concurrently search `hr.employee.work_email` and `res.users.login`
//!    (following the user's linked employee); whichever answers first with a
//!    record is used
//! 3. partial match on the display name derived from the email local part,
//!    only when that name is longer than [`MIN_FUZZY_NAME_LEN`]
//!
//! Successful resolutions are cached by lowercased email. There is no
//! active invalidation: an Odoo-side change is visible after the TTL.

use super::{EmployeeRecord, Record, RecordStore};
use crate::cache::{Clock, ExpiringCache, MemoryCache, SharedCache, SystemClock};
use crate::context::Principal;
use crate::error::{ResolveError, StoreError};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a resolution is reused.
pub const DEFAULT_EMPLOYEE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Derived names of this many characters or fewer are not searched.
pub const MIN_FUZZY_NAME_LEN: usize = 3;

const EMPLOYEE_MODEL: &str = "hr.employee";
const USER_MODEL: &str = "res.users";
const USER_FIELDS: &[&str] = &["id", "employee_id", "employee_ids"];

/// Cache of resolved employees keyed by lowercased email.
pub type EmployeeCache = SharedCache<String, EmployeeRecord>;

type Lookup<'a> = BoxFuture<'a, (&'static str, Result<Option<EmployeeRecord>, StoreError>)>;

/// Resolves principals to `hr.employee` records.
#[derive(Clone)]
pub struct EmployeeResolver {
    store: Arc<dyn RecordStore>,
    cache: EmployeeCache,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EmployeeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmployeeResolver")
            .field("ttl", &self.ttl)
            .field("cached_employees", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl EmployeeResolver {
    /// Resolver over `store` with a private in-memory cache.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: Arc::new(MemoryCache::new()),
            ttl: DEFAULT_EMPLOYEE_CACHE_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `cache` with entries kept for `ttl`.
    pub fn with_cache(mut self, cache: EmployeeCache, ttl: Duration) -> Self {
        self.cache = cache;
        self.ttl = ttl;
        self
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Map `principal` to an employee record.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::EmployeeNotFound`] when no strategy matches
    /// - [`ResolveError::Backend`] when the record store fails and no
    ///   strategy produced a record
    pub async fn resolve(&self, principal: &Principal) -> Result<EmployeeRecord, ResolveError> {
        let email = principal
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let cache_key = email.map(str::to_lowercase);

        if let Some(key) = &cache_key
            && let Some(employee) = self.cache.get(key, self.clock.now())
        {
            debug!(email = %key, employee_id = employee.id, "Employee cache hit");
            return Ok(employee);
        }

        if let Some(id) = principal.employee_id {
            if let Some(employee) = self.by_id(id).await? {
                return Ok(self.remember(cache_key, employee, "id_claim"));
            }
            warn!(employee_id = id, "Employee id claim matched no record");
        }

        let Some(email) = email else {
            return Err(ResolveError::EmployeeNotFound { email: None });
        };

        if let Some((employee, strategy)) = self.by_email_or_login(email).await? {
            return Ok(self.remember(cache_key, employee, strategy));
        }

        if let Some(employee) = self.by_fuzzy_name(email).await? {
            warn!(email = %email, employee = %employee.name, "Resolved employee by fuzzy name match");
            return Ok(self.remember(cache_key, employee, "fuzzy_name"));
        }

        Err(ResolveError::EmployeeNotFound {
            email: Some(email.to_string()),
        })
    }

    /// Whether `employee_id` names an active employee.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup fails.
    pub async fn validate_employee_access(&self, employee_id: i64) -> Result<bool, StoreError> {
        let rows = self
            .store
            .search_read(
                EMPLOYEE_MODEL,
                json!([["id", "=", employee_id], ["active", "=", true]]),
                &["id"],
                1,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    fn remember(
        &self,
        cache_key: Option<String>,
        employee: EmployeeRecord,
        strategy: &'static str,
    ) -> EmployeeRecord {
        info!(employee_id = employee.id, strategy, "Resolved employee");
        if let Some(key) = cache_key {
            let now = self.clock.now();
            self.cache.insert(key, employee.clone(), now + self.ttl, now);
        }
        employee
    }

    async fn by_id(&self, id: i64) -> Result<Option<EmployeeRecord>, StoreError> {
        let rows = self
            .store
            .search_read(
                EMPLOYEE_MODEL,
                json!([["id", "=", id]]),
                EmployeeRecord::FIELDS,
                1,
            )
            .await?;
        Ok(first_employee(&rows))
    }

    async fn by_email_or_login(
        &self,
        email: &str,
    ) -> Result<Option<(EmployeeRecord, &'static str)>, ResolveError> {
        let mut lookups: FuturesUnordered<Lookup<'_>> = FuturesUnordered::new();
        lookups.push(Box::pin(async move { ("work_email", self.by_work_email(email).await) }));
        lookups.push(Box::pin(async move { ("user_login", self.by_user_login(email).await) }));

        let mut failure = None;
        while let Some((strategy, outcome)) = lookups.next().await {
            match outcome {
                Ok(Some(employee)) => return Ok(Some((employee, strategy))),
                Ok(None) => {}
                Err(e) => {
                    warn!(strategy, error = %e, "Employee lookup failed");
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn by_work_email(&self, email: &str) -> Result<Option<EmployeeRecord>, StoreError> {
        let rows = self
            .store
            .search_read(
                EMPLOYEE_MODEL,
                json!([["work_email", "=ilike", email]]),
                EmployeeRecord::FIELDS,
                2,
            )
            .await?;
        if rows.len() > 1 {
            warn!(email = %email, matches = rows.len(), "Multiple employees share this work email, using the first");
        }
        Ok(first_employee(&rows))
    }

    async fn by_user_login(&self, email: &str) -> Result<Option<EmployeeRecord>, StoreError> {
        let users = self
            .store
            .search_read(USER_MODEL, json!([["login", "=ilike", email]]), USER_FIELDS, 1)
            .await?;
        let Some(employee_id) = users.first().and_then(linked_employee_id) else {
            return Ok(None);
        };
        let rows = self
            .store
            .read(EMPLOYEE_MODEL, &[employee_id], EmployeeRecord::FIELDS)
            .await?;
        Ok(first_employee(&rows))
    }

    async fn by_fuzzy_name(&self, email: &str) -> Result<Option<EmployeeRecord>, StoreError> {
        let Some(name) = fuzzy_name(email) else {
            return Ok(None);
        };
        let rows = self
            .store
            .search_read(
                EMPLOYEE_MODEL,
                json!([["name", "ilike", name]]),
                EmployeeRecord::FIELDS,
                1,
            )
            .await?;
        Ok(first_employee(&rows))
    }
}

fn first_employee(rows: &[Record]) -> Option<EmployeeRecord> {
    rows.first().and_then(EmployeeRecord::from_record)
}

/// Employee linked to a `res.users` row: `employee_id` first, then the
/// first of `employee_ids`.
fn linked_employee_id(user: &Record) -> Option<i64> {
    super::RecordRef::from_value(user.get("employee_id"))
        .map(|r| r.id)
        .or_else(|| {
            user.get("employee_ids")?
                .as_array()?
                .first()?
                .as_i64()
        })
}

/// Name-like string from an email local part, if long enough to search.
fn fuzzy_name(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default();
    let name = local.replace(['.', '_'], " ");
    (name.chars().count() > MIN_FUZZY_NAME_LEN).then_some(name)
}
