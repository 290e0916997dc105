//! Mapping authenticated principals to Odoo employee records

mod resolver;

pub use resolver::{DEFAULT_EMPLOYEE_CACHE_TTL, EmployeeCache, EmployeeResolver, MIN_FUZZY_NAME_LEN};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// One row returned by the record store.
pub type Record = Map<String, Value>;

/// The two record-store operations employee resolution needs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records of `model` matching `domain`, projected to `fields`, at most `limit`.
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Records of `model` with the given ids, projected to `fields`.
    async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>, StoreError>;
}

/// Reference to a related record (`many2one` value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    /// Related record id
    pub id: i64,
    /// Related record display name
    pub name: String,
}

impl RecordRef {
    /// Parse Odoo's `[id, "display name"]` form. `false` and anything else
    /// yields `None`.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        let pair = value?.as_array()?;
        let id = pair.first()?.as_i64()?;
        let name = pair.get(1).and_then(Value::as_str).unwrap_or_default();
        Some(Self {
            id,
            name: name.to_string(),
        })
    }
}

/// Minimal employee projection used for identity mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRecord {
    /// `hr.employee` id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Work email
    pub work_email: Option<String>,
    /// Department
    pub department: Option<RecordRef>,
}

impl EmployeeRecord {
    /// Fields to request from `hr.employee`.
    pub const FIELDS: &'static [&'static str] = &["id", "name", "work_email", "department_id"];

    /// Build from an `hr.employee` row. Returns `None` without an id.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record.get("id")?.as_i64()?;
        Some(Self {
            id,
            name: string_field(record, "name").unwrap_or_default(),
            work_email: string_field(record, "work_email"),
            department: RecordRef::from_value(record.get("department_id")),
        })
    }
}

/// String value of `field`, treating Odoo's `false` as absent.
pub fn string_field(record: &Record, field: &str) -> Option<String> {
    record.get(field).and_then(Value::as_str).map(str::to_string)
}
