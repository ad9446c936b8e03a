use axum::http::Method;
use common_auth::Claims;

use crate::policy::PermissionTable;

/// Canonical action names derived from HTTP verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// GET/HEAD -> read, POST -> create, PUT/PATCH -> update, DELETE -> delete.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(Action::Read),
            Method::POST => Some(Action::Create),
            Method::PUT | Method::PATCH => Some(Action::Update),
            Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Allow when any of the claim's roles is granted `action` on `resource`.
pub fn authorize(table: &PermissionTable, claims: &Claims, resource: &str, action: &str) -> Decision {
    if claims
        .roles
        .iter()
        .any(|role| table.can(role, resource, action))
    {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
