//! Employee self-service tools
//!
//! Every function takes the resolved employee id and filters on it; the
//! caller never supplies whose data to read.

use super::{Tool, parse_params, tool_error};
use crate::error::{ServerError, ServerResult};
use chrono::{Datelike, Local, NaiveDate};
use odoo_mcp_auth::employee::string_field;
use odoo_mcp_auth::{Record, RecordRef};
use odoo_mcp_erp::{OdooClient, SearchOptions};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::OnceLock;

const EMPLOYEE_MODEL: &str = "hr.employee";
const LEAVE_MODEL: &str = "hr.leave";
const LEAVE_TYPE_MODEL: &str = "hr.leave.type";
const HOLIDAY_MODEL: &str = "resource.calendar.leaves";

/// Fields visible when looking at another employee.
const PUBLIC_FIELDS: &[&str] = &[
    "id",
    "name",
    "work_email",
    "mobile_phone",
    "work_phone",
    "department_id",
    "job_id",
    "job_title",
    "parent_id",
    "coach_id",
];

/// Extra fields visible on the caller's own record.
const PRIVATE_FIELDS: &[&str] = &["private_email", "emergency_contact", "emergency_phone"];

const TEAM_LIMIT: usize = 50;
const DIRECTORY_LIMIT: usize = 10;
const LEAVE_REQUEST_LIMIT: usize = 50;

/// Leave states that can still be withdrawn.
const CANCELLABLE_STATES: &[&str] = &["draft", "confirm"];

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap())
        .is_match(email)
}

#[derive(Debug, Deserialize)]
struct FindColleagueParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContactParams {
    #[serde(default)]
    work_phone: Option<String>,
    #[serde(default)]
    mobile_phone: Option<String>,
    #[serde(default)]
    work_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeaveBalanceParams {
    #[serde(default)]
    leave_type: Option<String>,
    #[serde(default)]
    year: Option<i32>,
}

/// `status` filter of `get_my_leave_requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LeaveStatus {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    fn state_condition(self) -> Option<Value> {
        match self {
            Self::All => None,
            Self::Pending => Some(json!(["state", "in", ["draft", "confirm", "validate1"]])),
            Self::Approved => Some(json!(["state", "=", "validate"])),
            Self::Rejected => Some(json!(["state", "=", "refuse"])),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeaveRequestsParams {
    #[serde(default)]
    status: Option<LeaveStatus>,
}

#[derive(Debug, Deserialize)]
struct RequestLeaveParams {
    leave_type: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelLeaveParams {
    request_id: i64,
}

#[derive(Debug, Deserialize)]
struct YearParams {
    #[serde(default)]
    year: Option<i32>,
}

pub(super) async fn execute(odoo: &OdooClient, tool: Tool, arguments: Value, employee_id: i64) -> ServerResult<Value> {
    match tool {
        Tool::GetMyProfile => my_profile(odoo, employee_id).await,
        Tool::GetMyManager => my_manager(odoo, employee_id).await,
        Tool::GetMyTeam => my_team(odoo, employee_id).await,
        Tool::FindColleague => find_colleague(odoo, parse_params(arguments)?).await,
        Tool::GetDirectReports => direct_reports(odoo, employee_id).await,
        Tool::UpdateMyContact => update_contact(odoo, employee_id, parse_params(arguments)?).await,
        Tool::GetMyLeaveBalance => leave_balance(odoo, employee_id, parse_params(arguments)?).await,
        Tool::GetMyLeaveRequests => leave_requests(odoo, employee_id, parse_params(arguments)?).await,
        Tool::RequestLeave => request_leave(odoo, employee_id, parse_params(arguments)?).await,
        Tool::CancelLeaveRequest => cancel_leave(odoo, employee_id, parse_params(arguments)?).await,
        Tool::GetPublicHolidays => public_holidays(odoo, parse_params(arguments)?).await,
        other => Err(ServerError::ToolNotFound(other.name().to_string())),
    }
}

/// String field as JSON, with Odoo's `false` mapped to `null`.
fn text(record: &Record, field: &str) -> Value {
    string_field(record, field).map_or(Value::Null, Value::String)
}

/// Display name of a many2one field.
fn ref_name(record: &Record, field: &str) -> Value {
    RecordRef::from_value(record.get(field)).map_or(Value::Null, |r| Value::String(r.name))
}

fn ref_id(record: &Record, field: &str) -> Option<i64> {
    RecordRef::from_value(record.get(field)).map(|r| r.id)
}

fn number(record: &Record, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn current_year() -> i32 {
    Local::now().year()
}

async fn read_one(odoo: &OdooClient, model: &str, id: i64, fields: &[&str]) -> ServerResult<Option<Record>> {
    Ok(odoo.read(model, &[id], fields).await?.into_iter().next())
}

async fn my_profile(odoo: &OdooClient, employee_id: i64) -> ServerResult<Value> {
    let fields: Vec<&str> = PUBLIC_FIELDS.iter().chain(PRIVATE_FIELDS).copied().collect();
    let Some(emp) = read_one(odoo, EMPLOYEE_MODEL, employee_id, &fields).await? else {
        return Ok(tool_error("Employee not found"));
    };

    let job_title = match text(&emp, "job_title") {
        Value::Null => ref_name(&emp, "job_id"),
        title => title,
    };
    Ok(json!({
        "name": text(&emp, "name"),
        "work_email": text(&emp, "work_email"),
        "private_email": text(&emp, "private_email"),
        "mobile_phone": text(&emp, "mobile_phone"),
        "work_phone": text(&emp, "work_phone"),
        "department": ref_name(&emp, "department_id"),
        "job_title": job_title,
        "manager": ref_name(&emp, "parent_id"),
        "coach": ref_name(&emp, "coach_id"),
        "emergency_contact": text(&emp, "emergency_contact"),
        "emergency_phone": text(&emp, "emergency_phone"),
    }))
}

async fn my_manager(odoo: &OdooClient, employee_id: i64) -> ServerResult<Value> {
    let manager_id = read_one(odoo, EMPLOYEE_MODEL, employee_id, &["parent_id"])
        .await?
        .and_then(|emp| ref_id(&emp, "parent_id"));
    let Some(manager_id) = manager_id else {
        return Ok(json!({ "message": "No manager assigned" }));
    };

    let Some(mgr) = read_one(odoo, EMPLOYEE_MODEL, manager_id, PUBLIC_FIELDS).await? else {
        return Ok(tool_error("Manager not found"));
    };
    let phone = match text(&mgr, "work_phone") {
        Value::Null => text(&mgr, "mobile_phone"),
        phone => phone,
    };
    Ok(json!({
        "name": text(&mgr, "name"),
        "email": text(&mgr, "work_email"),
        "phone": phone,
        "department": ref_name(&mgr, "department_id"),
        "job_title": text(&mgr, "job_title"),
    }))
}

async fn my_team(odoo: &OdooClient, employee_id: i64) -> ServerResult<Value> {
    let department_id = read_one(odoo, EMPLOYEE_MODEL, employee_id, &["department_id"])
        .await?
        .and_then(|emp| ref_id(&emp, "department_id"));
    let Some(department_id) = department_id else {
        return Ok(json!([]));
    };

    let options = SearchOptions::default()
        .fields(["name", "work_email", "job_title", "parent_id"])
        .limit(TEAM_LIMIT);
    let team = odoo
        .search_read(
            EMPLOYEE_MODEL,
            json!([["department_id", "=", department_id], ["id", "!=", employee_id]]),
            &options,
        )
        .await?;

    let members: Vec<Value> = team
        .iter()
        .map(|member| {
            json!({
                "name": text(member, "name"),
                "email": text(member, "work_email"),
                "job_title": text(member, "job_title"),
                "is_manager": ref_id(member, "parent_id") == Some(employee_id),
            })
        })
        .collect();
    Ok(Value::Array(members))
}

async fn find_colleague(odoo: &OdooClient, params: FindColleagueParams) -> ServerResult<Value> {
    let options = SearchOptions::default()
        .fields(["name", "work_email", "mobile_phone", "department_id", "job_title"])
        .limit(DIRECTORY_LIMIT);
    let found = odoo
        .search_read(EMPLOYEE_MODEL, json!([["name", "ilike", params.name]]), &options)
        .await?;

    let colleagues: Vec<Value> = found
        .iter()
        .map(|c| {
            json!({
                "name": text(c, "name"),
                "work_email": text(c, "work_email"),
                "phone": text(c, "mobile_phone"),
                "department": ref_name(c, "department_id"),
                "job_title": text(c, "job_title"),
            })
        })
        .collect();
    Ok(Value::Array(colleagues))
}

async fn direct_reports(odoo: &OdooClient, employee_id: i64) -> ServerResult<Value> {
    let options = SearchOptions::default()
        .fields(["name", "work_email", "mobile_phone", "department_id", "job_title"])
        .limit(TEAM_LIMIT);
    let reports = odoo
        .search_read(EMPLOYEE_MODEL, json!([["parent_id", "=", employee_id]]), &options)
        .await?;

    let reports: Vec<Value> = reports
        .iter()
        .map(|r| {
            json!({
                "id": r.get("id").cloned().unwrap_or(Value::Null),
                "name": text(r, "name"),
                "email": text(r, "work_email"),
                "phone": text(r, "mobile_phone"),
                "department": ref_name(r, "department_id"),
                "job_title": text(r, "job_title"),
            })
        })
        .collect();
    let count = reports.len();
    let message = reports.is_empty().then_some("You have no direct reports");
    Ok(json!({
        "direct_reports": reports,
        "count": count,
        "message": message,
    }))
}

async fn update_contact(odoo: &OdooClient, employee_id: i64, params: ContactParams) -> ServerResult<Value> {
    let mut updates = Map::new();
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    if let Some(phone) = non_empty(params.work_phone) {
        updates.insert("work_phone".into(), Value::String(phone));
    }
    if let Some(phone) = non_empty(params.mobile_phone) {
        updates.insert("mobile_phone".into(), Value::String(phone));
    }
    if let Some(email) = non_empty(params.work_email) {
        if !is_valid_email(&email) {
            return Ok(tool_error("Invalid email format"));
        }
        updates.insert("work_email".into(), Value::String(email));
    }
    if updates.is_empty() {
        return Ok(tool_error(
            "No fields to update. Provide work_phone, mobile_phone, or work_email.",
        ));
    }

    let updated_fields: Vec<String> = updates.keys().cloned().collect();
    odoo.write(EMPLOYEE_MODEL, &[employee_id], Value::Object(updates)).await?;

    let fields = ["name", "work_email", "mobile_phone", "work_phone"];
    let mut result = json!({ "status": "updated", "updated_fields": updated_fields });
    if let Some(emp) = read_one(odoo, EMPLOYEE_MODEL, employee_id, &fields).await? {
        result["profile"] = json!({
            "name": text(&emp, "name"),
            "work_email": text(&emp, "work_email"),
            "mobile_phone": text(&emp, "mobile_phone"),
            "work_phone": text(&emp, "work_phone"),
        });
    }
    Ok(result)
}

async fn leave_balance(odoo: &OdooClient, employee_id: i64, params: LeaveBalanceParams) -> ServerResult<Value> {
    let year = params.year.unwrap_or_else(current_year);
    let kwargs = json!({
        "fields": ["id", "name", "max_leaves", "leaves_taken", "virtual_remaining_leaves"],
        "context": {
            "employee_id": employee_id,
            "default_date_from": format!("{year}-01-01"),
            "default_date_to": format!("{year}-12-31"),
        },
    });
    let leave_types = odoo
        .execute_kw(
            LEAVE_TYPE_MODEL,
            "search_read",
            json!([[["requires_allocation", "=", "yes"]]]),
            kwargs,
        )
        .await?;

    let wanted = params.leave_type.map(|t| t.to_lowercase());
    let balances: Vec<Value> = leave_types
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(|lt| {
            let name = string_field(lt, "name").unwrap_or_else(|| "Unknown".to_string());
            if let Some(wanted) = &wanted
                && !name.to_lowercase().contains(wanted.as_str())
            {
                return None;
            }
            let allocated = number(lt, "max_leaves");
            let taken = number(lt, "leaves_taken");
            (allocated > 0.0 || taken > 0.0).then(|| {
                json!({
                    "leave_type": name,
                    "allocated": allocated,
                    "taken": taken,
                    "remaining": number(lt, "virtual_remaining_leaves"),
                })
            })
        })
        .collect();

    Ok(json!({ "year": year, "balances": balances }))
}

async fn leave_requests(odoo: &OdooClient, employee_id: i64, params: LeaveRequestsParams) -> ServerResult<Value> {
    let mut domain = vec![json!(["employee_id", "=", employee_id])];
    domain.extend(params.status.unwrap_or_default().state_condition());

    let options = SearchOptions::default()
        .fields(["holiday_status_id", "date_from", "date_to", "number_of_days", "state", "name"])
        .limit(LEAVE_REQUEST_LIMIT);
    let requests = odoo.search_read(LEAVE_MODEL, json!(domain), &options).await?;

    let requests: Vec<Value> = requests
        .iter()
        .map(|r| {
            json!({
                "id": r.get("id").cloned().unwrap_or(Value::Null),
                "leave_type": ref_name(r, "holiday_status_id"),
                "start_date": text(r, "date_from"),
                "end_date": text(r, "date_to"),
                "days": r.get("number_of_days").cloned().unwrap_or(Value::Null),
                "state": text(r, "state"),
                "reason": text(r, "name"),
            })
        })
        .collect();
    Ok(Value::Array(requests))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

async fn request_leave(odoo: &OdooClient, employee_id: i64, params: RequestLeaveParams) -> ServerResult<Value> {
    let (Some(start), Some(end)) = (parse_date(&params.start_date), parse_date(&params.end_date)) else {
        return Ok(tool_error("Invalid date format. Use YYYY-MM-DD"));
    };
    if end < start {
        return Ok(tool_error("End date must be after start date"));
    }

    let options = SearchOptions::default().fields(["id", "name"]).limit(1);
    let leave_types = odoo
        .search_read(LEAVE_TYPE_MODEL, json!([["name", "ilike", params.leave_type]]), &options)
        .await?;
    let Some(leave_type_id) = leave_types.first().and_then(|lt| lt.get("id")).and_then(Value::as_i64) else {
        return Ok(tool_error(format!("Leave type '{}' not found", params.leave_type)));
    };

    let request_id = odoo
        .create(
            LEAVE_MODEL,
            json!({
                "employee_id": employee_id,
                "holiday_status_id": leave_type_id,
                "date_from": format!("{start} 08:00:00"),
                "date_to": format!("{end} 17:00:00"),
                "name": params.reason.unwrap_or_default(),
            }),
        )
        .await?;

    Ok(json!({
        "request_id": request_id,
        "status": "submitted",
        "message": "Leave request submitted successfully",
    }))
}

async fn cancel_leave(odoo: &OdooClient, employee_id: i64, params: CancelLeaveParams) -> ServerResult<Value> {
    let options = SearchOptions::default().fields(["state"]).limit(1);
    let found = odoo
        .search_read(
            LEAVE_MODEL,
            json!([["id", "=", params.request_id], ["employee_id", "=", employee_id]]),
            &options,
        )
        .await?;
    let Some(request) = found.first() else {
        return Ok(tool_error("Leave request not found or not yours"));
    };

    let state = string_field(request, "state").unwrap_or_default();
    if !CANCELLABLE_STATES.contains(&state.as_str()) {
        return Ok(tool_error("Cannot cancel approved or refused requests"));
    }

    odoo.unlink(LEAVE_MODEL, &[params.request_id]).await?;
    Ok(json!({ "status": "cancelled", "message": "Leave request cancelled" }))
}

async fn public_holidays(odoo: &OdooClient, params: YearParams) -> ServerResult<Value> {
    let year = params.year.unwrap_or_else(current_year);
    let domain = json!([
        ["resource_id", "=", false],
        ["date_from", ">=", format!("{year}-01-01")],
        ["date_to", "<=", format!("{year}-12-31 23:59:59")],
    ]);
    let options = SearchOptions::default()
        .fields(["name", "date_from", "date_to"])
        .order("date_from asc");
    let holidays = odoo.search_read(HOLIDAY_MODEL, domain, &options).await?;

    let holidays: Vec<Value> = holidays
        .iter()
        .map(|h| {
            json!({
                "name": text(h, "name"),
                "date_from": text(h, "date_from"),
                "date_to": text(h, "date_to"),
            })
        })
        .collect();
    let count = holidays.len();
    Ok(json!({ "year": year, "holidays": holidays, "count": count }))
}
