//! Read-only MCP resources

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use crate::tools::records::list_models;
use odoo_mcp_auth::Principal;
use odoo_mcp_auth::scopes::ODOO_READ;
use serde::Serialize;
use serde_json::{Value, json};

/// URI of the model catalogue resource.
pub const MODELS_URI: &str = "odoo://models";

/// A resource as advertised by `resources/list`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Resource URI
    pub uri: &'static str,
    /// Display name
    pub name: &'static str,
    /// Human description
    pub description: &'static str,
    /// Content type of the text payload
    pub mime_type: &'static str,
}

/// Every resource the server exposes.
pub fn list_resources() -> Vec<ResourceDefinition> {
    vec![ResourceDefinition {
        uri: MODELS_URI,
        name: "Odoo Models",
        description: "List of available Odoo models",
        mime_type: "application/json",
    }]
}

/// Read `uri` into a `resources/read` result.
///
/// # Errors
///
/// - [`ServerError::InsufficientScope`] without `odoo.read`
/// - [`ServerError::ResourceNotFound`] for an unknown URI
/// - [`ServerError::Odoo`] when the backend call fails
pub async fn read_resource(state: &AppState, principal: &Principal, uri: &str) -> ServerResult<Value> {
    if uri != MODELS_URI {
        return Err(ServerError::ResourceNotFound(uri.to_string()));
    }
    if !principal.is_authorized(&[ODOO_READ]) {
        return Err(ServerError::InsufficientScope {
            tool: uri.to_string(),
            required: vec![ODOO_READ.to_string()],
        });
    }

    let models = list_models(&state.odoo, None).await?;
    let text = serde_json::to_string(&models).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": text,
        }]
    }))
}
