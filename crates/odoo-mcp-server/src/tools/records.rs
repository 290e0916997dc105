//! Generic record tools over any Odoo model

use super::{Tool, parse_params, tool_error};
use crate::error::{ServerError, ServerResult};
use odoo_mcp_erp::{OdooClient, SearchOptions};
use serde::Deserialize;
use serde_json::{Map, Value, json};

const DEFAULT_LIMIT: usize = 20;

/// Model listing limit, shared with the `odoo://models` resource.
pub(crate) const MODEL_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchParams {
    model: String,
    #[serde(default)]
    domain: Option<Vec<Value>>,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
struct GetParams {
    model: String,
    record_id: i64,
    #[serde(default)]
    fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CreateParams {
    model: String,
    values: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    model: String,
    record_id: i64,
    values: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    model: String,
    record_id: i64,
}

#[derive(Debug, Deserialize)]
struct CountParams {
    model: String,
    #[serde(default)]
    domain: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ListModelsParams {
    #[serde(default)]
    filter: Option<String>,
}

pub(super) async fn execute(odoo: &OdooClient, tool: Tool, arguments: Value) -> ServerResult<Value> {
    match tool {
        Tool::SearchRecords => {
            let params: SearchParams = parse_params(arguments)?;
            let mut options = SearchOptions::default().limit(params.limit).offset(params.offset);
            if let Some(fields) = params.fields {
                options = options.fields(fields);
            }
            let records = odoo
                .search_read(&params.model, json!(params.domain.unwrap_or_default()), &options)
                .await?;
            Ok(json!(records))
        }
        Tool::GetRecord => {
            let params: GetParams = parse_params(arguments)?;
            let fields: Vec<&str> = params.fields.iter().flatten().map(String::as_str).collect();
            let records = odoo.read(&params.model, &[params.record_id], &fields).await?;
            Ok(records
                .into_iter()
                .next()
                .map_or_else(|| tool_error("Record not found"), Value::Object))
        }
        Tool::CreateRecord => {
            let params: CreateParams = parse_params(arguments)?;
            let id = odoo.create(&params.model, Value::Object(params.values)).await?;
            Ok(json!({ "id": id }))
        }
        Tool::UpdateRecord => {
            let params: UpdateParams = parse_params(arguments)?;
            let success = odoo
                .write(&params.model, &[params.record_id], Value::Object(params.values))
                .await?;
            Ok(json!({ "success": success }))
        }
        Tool::DeleteRecord => {
            let params: DeleteParams = parse_params(arguments)?;
            let success = odoo.unlink(&params.model, &[params.record_id]).await?;
            Ok(json!({ "success": success }))
        }
        Tool::CountRecords => {
            let params: CountParams = parse_params(arguments)?;
            let count = odoo
                .search_count(&params.model, json!(params.domain.unwrap_or_default()))
                .await?;
            Ok(json!({ "count": count }))
        }
        Tool::ListModels => {
            let params: ListModelsParams = parse_params(arguments)?;
            let models = list_models(odoo, params.filter.as_deref()).await?;
            Ok(json!(models))
        }
        other => Err(ServerError::ToolNotFound(other.name().to_string())),
    }
}

/// Non-transient models, optionally narrowed by technical or display name.
pub(crate) async fn list_models(odoo: &OdooClient, filter: Option<&str>) -> ServerResult<Vec<Map<String, Value>>> {
    let mut domain = vec![json!(["transient", "=", false])];
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        domain.push(json!("|"));
        domain.push(json!(["model", "ilike", filter]));
        domain.push(json!(["name", "ilike", filter]));
    }
    let options = SearchOptions::default()
        .fields(["model", "name"])
        .limit(MODEL_LIST_LIMIT);
    Ok(odoo.search_read("ir.model", json!(domain), &options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_defaults() {
        let params: SearchParams = parse_params(json!({"model": "res.partner"})).unwrap();
        assert_eq!(params.limit, 20);
        assert_eq!(params.offset, 0);
        assert!(params.domain.is_none());
        assert!(params.fields.is_none());
    }

    #[test]
    fn test_null_domain_is_accepted() {
        let params: CountParams = parse_params(json!({"model": "res.partner", "domain": null})).unwrap();
        assert!(params.domain.is_none());
    }

    #[test]
    fn test_missing_model_is_invalid_params() {
        let err = parse_params::<GetParams>(json!({"record_id": 4})).unwrap_err();
        assert!(matches!(err, ServerError::InvalidParams(ref msg) if msg.contains("model")));
    }

    #[test]
    fn test_values_must_be_an_object() {
        let err = parse_params::<CreateParams>(json!({"model": "res.partner", "values": [1, 2]})).unwrap_err();
        assert!(matches!(err, ServerError::InvalidParams(_)));
    }
}
