use std::collections::{HashMap, HashSet};

use common_auth::{ROLE_ADMIN, ROLE_AUDITOR, ROLE_GUEST, ROLE_USER};

pub const RESOURCE_USERS: &str = "users";
pub const RESOURCE_AUDIT_LOGS: &str = "auditLogs";
pub const RESOURCE_PROFILE: &str = "profile";
pub const RESOURCE_BOOKS: &str = "books";
pub const RESOURCE_METRICS: &str = "metrics";
pub const RESOURCE_HEALTH: &str = "health";

const CRUD: &[&str] = &["create", "read", "update", "delete"];

/// Static role -> resource -> actions policy.
///
/// Built once at startup and shared read-only; there are no mutating methods.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    grants: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl PermissionTable {
    pub fn builder() -> PermissionTableBuilder {
        PermissionTableBuilder::default()
    }

    /// The table the gateway ships with.
    pub fn standard() -> Self {
        Self::builder()
            .grant(ROLE_ADMIN, RESOURCE_USERS, CRUD)
            .grant(ROLE_ADMIN, RESOURCE_AUDIT_LOGS, &["read", "delete"])
            .grant(ROLE_ADMIN, RESOURCE_BOOKS, CRUD)
            .grant(ROLE_ADMIN, RESOURCE_METRICS, &["read"])
            .grant(ROLE_ADMIN, RESOURCE_HEALTH, &["read"])
            .grant(ROLE_ADMIN, RESOURCE_PROFILE, &["read", "update"])
            .grant(ROLE_USER, RESOURCE_PROFILE, &["read", "update"])
            .grant(ROLE_USER, RESOURCE_BOOKS, &["read"])
            .grant(ROLE_USER, "data", &["read"])
            .grant(ROLE_AUDITOR, RESOURCE_AUDIT_LOGS, &["read"])
            .grant(ROLE_AUDITOR, RESOURCE_PROFILE, &["read", "update"])
            .grant(ROLE_GUEST, "auth", &["register", "login"])
            .build()
    }

    /// Exact-match lookup. Unknown roles, resources and actions deny.
    pub fn can(&self, role: &str, resource: &str, action: &str) -> bool {
        self.grants
            .get(role)
            .and_then(|resources| resources.get(resource))
            .is_some_and(|actions| actions.contains(action))
    }
}

#[derive(Debug, Default)]
pub struct PermissionTableBuilder {
    grants: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl PermissionTableBuilder {
    pub fn grant(mut self, role: &str, resource: &str, actions: &[&str]) -> Self {
        self.grants
            .entry(role.to_string())
            .or_default()
            .entry(resource.to_string())
            .or_default()
            .extend(actions.iter().map(|action| action.to_string()));
        self
    }

    pub fn build(self) -> PermissionTable {
        PermissionTable {
            grants: self.grants,
        }
    }
}
