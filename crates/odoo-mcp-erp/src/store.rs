//! [`RecordStore`] over the Odoo client, used by employee resolution

use crate::client::{OdooClient, SearchOptions};
use crate::error::OdooError;
use async_trait::async_trait;
use odoo_mcp_auth::{Record, RecordStore, StoreError};
use serde_json::Value;

impl From<OdooError> for StoreError {
    fn from(error: OdooError) -> Self {
        if error.is_retryable() {
            StoreError::Unavailable(error.to_string())
        } else {
            StoreError::Fault(error.to_string())
        }
    }
}

#[async_trait]
impl RecordStore for OdooClient {
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let options = SearchOptions::default().fields(fields.iter().copied()).limit(limit);
        Ok(OdooClient::search_read(self, model, domain, &options).await?)
    }

    async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>, StoreError> {
        Ok(OdooClient::read(self, model, ids, fields).await?)
    }
}
