//! Scope catalogue and the capability gate

use std::collections::BTreeSet;

/// OpenID Connect
pub const OPENID: &str = "openid";
/// Email address
pub const EMAIL: &str = "email";
/// Basic profile
pub const PROFILE: &str = "profile";
/// Read access to all data
pub const ODOO_READ: &str = "odoo.read";
/// Write access to all data
pub const ODOO_WRITE: &str = "odoo.write";
/// View own employee profile
pub const HR_PROFILE: &str = "odoo.hr.profile";
/// Update own contact details
pub const HR_PROFILE_WRITE: &str = "odoo.hr.profile.write";
/// View own team
pub const HR_TEAM: &str = "odoo.hr.team";
/// Search the employee directory
pub const HR_DIRECTORY: &str = "odoo.hr.directory";
/// View own leave balance and requests
pub const LEAVE_READ: &str = "odoo.leave.read";
/// Submit and cancel own leave requests
pub const LEAVE_WRITE: &str = "odoo.leave.write";
/// View own documents
pub const DOCUMENTS_READ: &str = "odoo.documents.read";
/// Upload own documents
pub const DOCUMENTS_WRITE: &str = "odoo.documents.write";
/// Administrative access
pub const ODOO_ADMIN: &str = "odoo.admin";

/// Every scope this server understands, with a description.
pub const CATALOGUE: &[(&str, &str)] = &[
    (OPENID, "OpenID Connect"),
    (EMAIL, "Email address"),
    (PROFILE, "Basic profile"),
    (ODOO_READ, "Read access to all data"),
    (ODOO_WRITE, "Write access to all data"),
    (HR_PROFILE, "View own employee profile"),
    (HR_PROFILE_WRITE, "Update own contact details"),
    (HR_TEAM, "View own team"),
    (HR_DIRECTORY, "Search the employee directory"),
    (LEAVE_READ, "View own leave balance and requests"),
    (LEAVE_WRITE, "Submit and cancel own leave requests"),
    (DOCUMENTS_READ, "View own documents"),
    (DOCUMENTS_WRITE, "Upload own documents"),
    (ODOO_ADMIN, "Administrative access"),
];

/// Identity scopes understood by the federated provider.
pub const IDENTITY_SCOPES: &[&str] = &[OPENID, EMAIL, PROFILE];

/// Granted to verified federated users whose token carries no scopes.
pub const FEDERATED_DEFAULT_SCOPES: &[&str] = &[
    OPENID,
    EMAIL,
    PROFILE,
    HR_PROFILE,
    HR_TEAM,
    HR_DIRECTORY,
    LEAVE_READ,
    LEAVE_WRITE,
    DOCUMENTS_READ,
    ODOO_READ,
];

/// Added on top of the defaults for internal-domain users.
pub const INTERNAL_EXTRA_SCOPES: &[&str] = &[DOCUMENTS_WRITE, ODOO_WRITE];

/// Unordered set of granted scope strings.
pub type ScopeSet = BTreeSet<String>;

/// Parse a space-delimited scope string.
pub fn parse_scopes(scope: Option<&str>) -> ScopeSet {
    scope
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// All catalogue scope names.
pub fn all_scopes() -> ScopeSet {
    CATALOGUE.iter().map(|(name, _)| (*name).to_string()).collect()
}

/// Whether `granted` satisfies `required`.
///
/// Required lists are alternatives: any single required scope being
/// granted is enough. An empty requirement list authorizes nothing.
pub fn is_authorized<S: AsRef<str>>(required: &[S], granted: &ScopeSet) -> bool {
    required.iter().any(|scope| granted.contains(scope.as_ref()))
}
