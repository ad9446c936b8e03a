pub mod error;
pub mod gate;
pub mod guard;
pub mod policy;

pub use error::SecurityError;
pub use gate::{authorize, Action, Decision};
pub use guard::{enforce, RouteGuard};
pub use policy::{
    PermissionTable, PermissionTableBuilder, RESOURCE_AUDIT_LOGS, RESOURCE_BOOKS, RESOURCE_HEALTH,
    RESOURCE_METRICS, RESOURCE_PROFILE, RESOURCE_USERS,
};
