//! JSON-RPC request routing for the MCP endpoint
//!
//! | Method                      | Result                                  |
//! |-----------------------------|-----------------------------------------|
//! | `initialize`                | protocol version, capabilities, server  |
//! | `notifications/initialized` | `{}`                                    |
//! | `ping`                      | `{}`                                    |
//! | `tools/list`                | tools the caller's scopes allow         |
//! | `tools/call`                | `{ content: [{ type: "text", text }] }` |
//! | `resources/list`            | `odoo://models`                         |
//! | `resources/read`            | `{ contents: [{ uri, mimeType, text }] }` |
//! | anything else               | `-32601`                                |

use crate::error::{JsonRpcError, ServerError, ServerResult};
use crate::state::AppState;
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION, resources, tools};
use odoo_mcp_auth::Principal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info};

/// JSON-RPC parse error code.
pub const PARSE_ERROR: i32 = -32700;

/// JSON-RPC invalid request code.
pub const INVALID_REQUEST: i32 = -32600;

/// JSON-RPC request structure.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (absent for notifications)
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (echoed from request)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, error: impl Into<JsonRpcError>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Response to a body that is not valid JSON-RPC.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::error(
            None,
            JsonRpcError {
                code: PARSE_ERROR,
                message: "Parse error".to_string(),
                data: Some(json!({ "detail": detail.into() })),
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// Route one request for an authenticated `principal`.
///
/// Never fails: every error becomes a JSON-RPC error response.
pub async fn route_request(state: &AppState, principal: &Principal, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            id,
            JsonRpcError {
                code: INVALID_REQUEST,
                message: format!("Unsupported JSON-RPC version: {}", request.jsonrpc),
                data: None,
            },
        );
    }

    let method = request.method.clone();
    debug!(method = %method, subject = %principal.subject, "MCP request");

    match dispatch(state, principal, request).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(method = %method, error = %err, "MCP request failed");
            } else {
                info!(method = %method, error = %err, "MCP request rejected");
            }
            JsonRpcResponse::error(id, err)
        }
    }
}

async fn dispatch(state: &AppState, principal: &Principal, request: JsonRpcRequest) -> ServerResult<Value> {
    match request.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "initialized" | "notifications/initialized" | "ping" => Ok(json!({})),

        "tools/list" => Ok(json!({ "tools": tools::list_tools(principal) })),
        "tools/call" => {
            let params: ToolCallParams = params(request.params, "Missing tool name")?;
            let result = tools::call_tool(state, principal, &params.name, params.arguments).await?;
            let text = serde_json::to_string(&result).map_err(|e| ServerError::Internal(e.to_string()))?;
            Ok(json!({ "content": [{ "type": "text", "text": text }] }))
        }

        "resources/list" => Ok(json!({ "resources": resources::list_resources() })),
        "resources/read" => {
            let params: ResourceReadParams = params(request.params, "Missing resource URI")?;
            resources::read_resource(state, principal, &params.uri).await
        }

        other => Err(ServerError::MethodNotFound(other.to_string())),
    }
}

fn params<T: serde::de::DeserializeOwned>(params: Option<Value>, missing: &str) -> ServerResult<T> {
    let params = params.ok_or_else(|| ServerError::InvalidParams(missing.to_string()))?;
    serde_json::from_value(params).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false },
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
        },
    })
}
