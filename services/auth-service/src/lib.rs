pub mod admin_handlers;
pub mod app;
pub mod audit_handlers;
pub mod audit_store;
pub mod auth_handlers;
pub mod config;
pub mod extract;
pub mod health;
pub mod metrics;
pub mod pagination;
pub mod rate_limiter;
pub mod routes;
pub mod tokens;
pub mod user_handlers;

pub use app::AppState;
pub use routes::build_router;
