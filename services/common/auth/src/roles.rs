pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
pub const ROLE_AUDITOR: &str = "auditor";
pub const ROLE_GUEST: &str = "guest";

pub const KNOWN_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_USER, ROLE_AUDITOR, ROLE_GUEST];

pub fn is_known_role(role: &str) -> bool {
    KNOWN_ROLES.contains(&role)
}
