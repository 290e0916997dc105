//! Tool catalogue, scope gate and dispatch
//!
//! Every tool maps to an any-of list of scopes. Calls are gated before any
//! Odoo traffic; self-service tools additionally resolve the caller to an
//! `hr.employee` and only ever touch that employee's data.

mod employee;
pub(crate) mod records;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use odoo_mcp_auth::Principal;
use odoo_mcp_auth::scopes::{
    HR_DIRECTORY, HR_PROFILE, HR_PROFILE_WRITE, HR_TEAM, LEAVE_READ, LEAVE_WRITE, ODOO_READ, ODOO_WRITE,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Scopes required by a tool name that is not in the catalogue.
pub const UNKNOWN_TOOL_SCOPES: &[&str] = &[ODOO_READ];

/// Every tool the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Search any model with a domain
    SearchRecords,
    /// Read one record by id
    GetRecord,
    /// Create a record
    CreateRecord,
    /// Write fields on a record
    UpdateRecord,
    /// Delete a record
    DeleteRecord,
    /// Count records matching a domain
    CountRecords,
    /// List non-transient models
    ListModels,
    /// Caller's own employee profile
    GetMyProfile,
    /// Caller's manager
    GetMyManager,
    /// Colleagues in the caller's department
    GetMyTeam,
    /// Directory search by name
    FindColleague,
    /// Employees whose manager is the caller
    GetDirectReports,
    /// Update the caller's phone numbers or work email
    UpdateMyContact,
    /// Leave allocations for a year
    GetMyLeaveBalance,
    /// Caller's leave requests
    GetMyLeaveRequests,
    /// Submit a leave request
    RequestLeave,
    /// Withdraw a pending leave request
    CancelLeaveRequest,
    /// Company-wide holidays for a year
    GetPublicHolidays,
}

impl Tool {
    /// Catalogue order, as listed by `tools/list`.
    pub const ALL: [Self; 18] = [
        Self::SearchRecords,
        Self::GetRecord,
        Self::CreateRecord,
        Self::UpdateRecord,
        Self::DeleteRecord,
        Self::CountRecords,
        Self::ListModels,
        Self::GetMyProfile,
        Self::GetMyManager,
        Self::GetMyTeam,
        Self::FindColleague,
        Self::GetDirectReports,
        Self::UpdateMyContact,
        Self::GetMyLeaveBalance,
        Self::GetMyLeaveRequests,
        Self::RequestLeave,
        Self::CancelLeaveRequest,
        Self::GetPublicHolidays,
    ];

    /// Look up a tool by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::SearchRecords => "search_records",
            Self::GetRecord => "get_record",
            Self::CreateRecord => "create_record",
            Self::UpdateRecord => "update_record",
            Self::DeleteRecord => "delete_record",
            Self::CountRecords => "count_records",
            Self::ListModels => "list_models",
            Self::GetMyProfile => "get_my_profile",
            Self::GetMyManager => "get_my_manager",
            Self::GetMyTeam => "get_my_team",
            Self::FindColleague => "find_colleague",
            Self::GetDirectReports => "get_direct_reports",
            Self::UpdateMyContact => "update_my_contact",
            Self::GetMyLeaveBalance => "get_my_leave_balance",
            Self::GetMyLeaveRequests => "get_my_leave_requests",
            Self::RequestLeave => "request_leave",
            Self::CancelLeaveRequest => "cancel_leave_request",
            Self::GetPublicHolidays => "get_public_holidays",
        }
    }

    /// Scopes any one of which allows the call.
    pub fn required_scopes(self) -> &'static [&'static str] {
        match self {
            Self::GetMyProfile | Self::GetMyManager => &[HR_PROFILE, ODOO_READ],
            Self::GetMyTeam | Self::GetDirectReports => &[HR_TEAM, ODOO_READ],
            Self::FindColleague => &[HR_DIRECTORY, ODOO_READ],
            Self::UpdateMyContact => &[HR_PROFILE_WRITE, ODOO_WRITE],
            Self::GetMyLeaveBalance | Self::GetMyLeaveRequests | Self::GetPublicHolidays => {
                &[LEAVE_READ, ODOO_READ]
            }
            Self::RequestLeave | Self::CancelLeaveRequest => &[LEAVE_WRITE, ODOO_WRITE],
            Self::SearchRecords | Self::GetRecord | Self::CountRecords | Self::ListModels => &[ODOO_READ],
            Self::CreateRecord | Self::UpdateRecord | Self::DeleteRecord => &[ODOO_WRITE],
        }
    }

    /// Whether the tool acts on the caller's own employee record.
    pub fn is_self_service(self) -> bool {
        !matches!(
            self,
            Self::SearchRecords
                | Self::GetRecord
                | Self::CreateRecord
                | Self::UpdateRecord
                | Self::DeleteRecord
                | Self::CountRecords
                | Self::ListModels
        )
    }

    /// Human description shown to the client.
    pub fn description(self) -> &'static str {
        match self {
            Self::SearchRecords => "Search for records in an Odoo model with filters",
            Self::GetRecord => "Get a single record by ID",
            Self::CreateRecord => "Create a new record in Odoo",
            Self::UpdateRecord => "Update an existing record",
            Self::DeleteRecord => "Delete a record",
            Self::CountRecords => "Count records matching criteria",
            Self::ListModels => "List available Odoo models",
            Self::GetMyProfile => {
                "Get your employee profile information including name, email, department, job title, and manager"
            }
            Self::GetMyManager => "Get information about your direct manager including their name, email, and phone",
            Self::GetMyTeam => "Get list of colleagues in your department/team",
            Self::FindColleague => {
                "Find a colleague by name and get their contact information (email, phone, department)"
            }
            Self::GetDirectReports => {
                "Get employees who report directly to you (for managers). Returns empty list if you're not a manager."
            }
            Self::UpdateMyContact => "Update your contact information (work phone, mobile phone, or work email)",
            Self::GetMyLeaveBalance => {
                "Get your remaining leave balance for all leave types (vacation, sick leave, etc.) for a specific year"
            }
            Self::GetMyLeaveRequests => "Get your leave/time-off requests and their status",
            Self::RequestLeave => "Submit a new leave/time-off request",
            Self::CancelLeaveRequest => "Cancel a pending leave request",
            Self::GetPublicHolidays => "Get company public holidays for a specific year",
        }
    }

    /// JSON Schema of the arguments object.
    pub fn input_schema(self) -> Value {
        match self {
            Self::SearchRecords => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name (e.g., 'res.partner')"},
                    "domain": {"type": "array", "description": "Search domain filters", "default": []},
                    "fields": {"type": "array", "items": {"type": "string"}, "description": "Fields to return"},
                    "limit": {"type": "integer", "description": "Maximum records to return", "default": 20},
                    "offset": {"type": "integer", "description": "Number of records to skip", "default": 0}
                },
                "required": ["model"]
            }),
            Self::GetRecord => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name"},
                    "record_id": {"type": "integer", "description": "Record ID"},
                    "fields": {"type": "array", "items": {"type": "string"}, "description": "Fields to return"}
                },
                "required": ["model", "record_id"]
            }),
            Self::CreateRecord => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name"},
                    "values": {"type": "object", "description": "Field values for new record"}
                },
                "required": ["model", "values"]
            }),
            Self::UpdateRecord => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name"},
                    "record_id": {"type": "integer", "description": "Record ID to update"},
                    "values": {"type": "object", "description": "Field values to update"}
                },
                "required": ["model", "record_id", "values"]
            }),
            Self::DeleteRecord => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name"},
                    "record_id": {"type": "integer", "description": "Record ID to delete"}
                },
                "required": ["model", "record_id"]
            }),
            Self::CountRecords => json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Odoo model name"},
                    "domain": {"type": "array", "description": "Search domain filters", "default": []}
                },
                "required": ["model"]
            }),
            Self::ListModels => json!({
                "type": "object",
                "properties": {
                    "filter": {"type": "string", "description": "Only models whose technical or display name contains this text"}
                }
            }),
            Self::GetMyProfile | Self::GetMyManager | Self::GetMyTeam | Self::GetDirectReports => {
                json!({"type": "object", "properties": {}})
            }
            Self::FindColleague => json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Name or partial name to search for"}
                },
                "required": ["name"]
            }),
            Self::UpdateMyContact => json!({
                "type": "object",
                "properties": {
                    "work_phone": {"type": "string", "description": "Work phone number"},
                    "mobile_phone": {"type": "string", "description": "Mobile phone number"},
                    "work_email": {"type": "string", "format": "email", "description": "Work email address"}
                }
            }),
            Self::GetMyLeaveBalance => json!({
                "type": "object",
                "properties": {
                    "leave_type": {
                        "type": "string",
                        "description": "Optional: specific leave type to check (e.g., 'Paid Time Off', 'Sick Leave')"
                    },
                    "year": {"type": "integer", "description": "Year to check balance for (default: current year)"}
                }
            }),
            Self::GetMyLeaveRequests => json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["all", "pending", "approved", "rejected"],
                        "default": "all",
                        "description": "Filter by request status"
                    }
                }
            }),
            Self::RequestLeave => json!({
                "type": "object",
                "properties": {
                    "leave_type": {
                        "type": "string",
                        "description": "Type of leave (e.g., 'Paid Time Off', 'Sick Leave', 'Vacation')"
                    },
                    "start_date": {"type": "string", "format": "date", "description": "Start date in YYYY-MM-DD format"},
                    "end_date": {"type": "string", "format": "date", "description": "End date in YYYY-MM-DD format"},
                    "reason": {"type": "string", "description": "Reason for the leave request"}
                },
                "required": ["leave_type", "start_date", "end_date"]
            }),
            Self::CancelLeaveRequest => json!({
                "type": "object",
                "properties": {
                    "request_id": {"type": "integer", "description": "ID of the leave request to cancel"}
                },
                "required": ["request_id"]
            }),
            Self::GetPublicHolidays => json!({
                "type": "object",
                "properties": {
                    "year": {"type": "integer", "description": "Year to get holidays for (default: current year)"}
                }
            }),
        }
    }

    /// Entry for `tools/list`.
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

/// A tool as advertised to MCP clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Wire name
    pub name: &'static str,
    /// Human description
    pub description: &'static str,
    /// JSON Schema of the arguments
    pub input_schema: Value,
}

/// Scopes required for `name`; unknown names require [`UNKNOWN_TOOL_SCOPES`].
pub fn required_scopes(name: &str) -> &'static [&'static str] {
    Tool::from_name(name).map_or(UNKNOWN_TOOL_SCOPES, Tool::required_scopes)
}

/// Gate a call to `name`.
///
/// # Errors
///
/// [`ServerError::InsufficientScope`] naming the tool and the scopes that
/// would have allowed it.
pub fn check_access(principal: &Principal, name: &str) -> ServerResult<()> {
    let required = required_scopes(name);
    if principal.is_authorized(required) {
        return Ok(());
    }
    warn!(
        tool = name,
        subject = %principal.subject,
        required = ?required,
        "Tool call rejected: insufficient scope"
    );
    Err(ServerError::InsufficientScope {
        tool: name.to_string(),
        required: required.iter().map(ToString::to_string).collect(),
    })
}

/// Tools `principal` may call, in catalogue order.
pub fn list_tools(principal: &Principal) -> Vec<ToolDefinition> {
    Tool::ALL
        .into_iter()
        .filter(|tool| principal.is_authorized(tool.required_scopes()))
        .map(Tool::definition)
        .collect()
}

/// Gate, resolve and execute a tool call.
///
/// Returns the tool's JSON result. Tool-level input problems (bad dates,
/// nothing to update) are results of the form `{"error": ...}`, not errors.
///
/// # Errors
///
/// - [`ServerError::InsufficientScope`] before any Odoo traffic
/// - [`ServerError::ToolNotFound`] for a name outside the catalogue
/// - [`ServerError::Resolve`] when a self-service caller has no employee
/// - [`ServerError::InvalidParams`] for missing or mistyped arguments
/// - [`ServerError::Odoo`] when the backend call fails
pub async fn call_tool(
    state: &AppState,
    principal: &Principal,
    name: &str,
    arguments: Option<Value>,
) -> ServerResult<Value> {
    check_access(principal, name)?;
    let tool = Tool::from_name(name).ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;

    let arguments = match arguments {
        None | Some(Value::Null) => json!({}),
        Some(args @ Value::Object(_)) => args,
        Some(_) => return Err(ServerError::InvalidParams("arguments must be an object".into())),
    };

    if tool.is_self_service() {
        let employee = state.resolver.resolve(principal).await?;
        debug!(tool = name, employee_id = employee.id, "Resolved caller to employee");
        let result = employee::execute(&state.odoo, tool, arguments, employee.id).await?;
        if matches!(tool, Tool::UpdateMyContact | Tool::RequestLeave | Tool::CancelLeaveRequest) {
            info!(tool = name, employee_id = employee.id, "Self-service write completed");
        }
        Ok(result)
    } else {
        records::execute(&state.odoo, tool, arguments).await
    }
}

/// Deserialize tool arguments into a typed parameter struct.
fn parse_params<T: DeserializeOwned>(arguments: Value) -> ServerResult<T> {
    serde_json::from_value(arguments).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

/// `{"error": message}` tool result.
fn tool_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use odoo_mcp_auth::scopes::{self, FEDERATED_DEFAULT_SCOPES, INTERNAL_EXTRA_SCOPES};
    use odoo_mcp_auth::ScopeSet;
    use std::collections::HashSet;

    fn principal(granted: &[&str]) -> Principal {
        let scopes: ScopeSet = granted.iter().map(ToString::to_string).collect();
        Principal::development("jane@example.com", scopes)
    }

    #[test]
    fn test_names_round_trip_and_are_unique() {
        let names: HashSet<_> = Tool::ALL.iter().map(|tool| tool.name()).collect();
        assert_eq!(names.len(), Tool::ALL.len());
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("get_my_documents"), None);
    }

    #[test]
    fn test_every_scope_is_in_the_catalogue() {
        let known: HashSet<_> = scopes::CATALOGUE.iter().map(|(scope, _)| *scope).collect();
        for tool in Tool::ALL {
            assert!(!tool.required_scopes().is_empty(), "{} has no scopes", tool.name());
            for scope in tool.required_scopes() {
                assert!(known.contains(scope), "{} requires unknown scope {scope}", tool.name());
            }
        }
    }

    #[test]
    fn test_unknown_tool_requires_read() {
        assert_eq!(required_scopes("does_not_exist"), &["odoo.read"]);
        assert_eq!(required_scopes("create_record"), &["odoo.write"]);
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in Tool::ALL {
            let schema = tool.input_schema();
            assert_eq!(schema["type"], "object", "{}", tool.name());
            assert!(schema["properties"].is_object(), "{}", tool.name());
        }
    }

    #[test]
    fn test_default_grant_cannot_write_records() {
        let listed: Vec<_> = list_tools(&principal(FEDERATED_DEFAULT_SCOPES))
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert!(listed.contains(&"get_my_profile"));
        assert!(listed.contains(&"request_leave"));
        assert!(listed.contains(&"search_records"));
        assert!(!listed.contains(&"create_record"));
        assert!(!listed.contains(&"delete_record"));
        assert!(!listed.contains(&"update_my_contact"));
    }

    #[test]
    fn test_internal_grant_adds_record_writes() {
        let granted: Vec<&str> = FEDERATED_DEFAULT_SCOPES
            .iter()
            .chain(INTERNAL_EXTRA_SCOPES)
            .copied()
            .collect();
        let listed = list_tools(&principal(&granted));
        assert_eq!(listed.len(), Tool::ALL.len());
    }

    #[test]
    fn test_self_service_scope_alone() {
        let listed: Vec<_> = list_tools(&principal(&["odoo.hr.profile"]))
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(listed, vec!["get_my_profile", "get_my_manager"]);
    }

    #[test]
    fn test_check_access_names_required_scopes() {
        let err = check_access(&principal(&["odoo.read"]), "delete_record").unwrap_err();
        match err {
            ServerError::InsufficientScope { tool, required } => {
                assert_eq!(tool, "delete_record");
                assert_eq!(required, vec!["odoo.write".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(check_access(&principal(&["odoo.write"]), "update_my_contact").is_ok());
    }

    #[test]
    fn test_definition_serializes_camel_case() {
        let value = serde_json::to_value(Tool::CancelLeaveRequest.definition()).unwrap();
        assert_eq!(value["name"], "cancel_leave_request");
        assert_eq!(value["inputSchema"]["required"], json!(["request_id"]));
    }
}
