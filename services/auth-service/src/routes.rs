use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use common_http_errors::ApiError;
use common_security::{
    enforce, RouteGuard, RESOURCE_AUDIT_LOGS, RESOURCE_METRICS, RESOURCE_PROFILE, RESOURCE_USERS,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::admin_handlers::{list_users, update_roles, update_status};
use crate::audit_handlers::{delete_log, get_log, list_logs, record_log, SERVICE_TOKEN_HEADER};
use crate::auth_handlers::{login, logout, refresh_session, register};
use crate::health::{healthz, readyz};
use crate::metrics::{metrics_endpoint, track_requests};
use crate::rate_limiter::{rate_limit, RateLimitState};
use crate::user_handlers::{get_profile, update_profile};
use crate::AppState;

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("not_found", "Not Found")
}

fn guard(state: &AppState, resource: &'static str) -> RouteGuard {
    RouteGuard::new(
        state.jwt_verifier.clone(),
        state.permissions.clone(),
        resource,
    )
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if origin != "*" => Some(value),
            _ => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(SERVICE_TOKEN_HEADER),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh_session))
        .route("/v1/auth/logout", post(logout));

    let profile = Router::new()
        .route("/v1/users/me", get(get_profile).patch(update_profile))
        .route_layer(from_fn_with_state(guard(&state, RESOURCE_PROFILE), enforce));

    let admin = Router::new()
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/:id/roles", patch(update_roles))
        .route("/v1/admin/users/:id/status", patch(update_status))
        .route_layer(from_fn_with_state(guard(&state, RESOURCE_USERS), enforce));

    let audit_read = Router::new()
        .route("/v1/audit/logs/:id", get(get_log).delete(delete_log))
        .route_layer(from_fn_with_state(guard(&state, RESOURCE_AUDIT_LOGS), enforce));

    // Writes come from other services and carry a service token instead of a JWT.
    let audit_list = Router::new()
        .route(
            "/v1/audit/logs",
            get(list_logs)
                .route_layer(from_fn_with_state(guard(&state, RESOURCE_AUDIT_LOGS), enforce))
                .post(record_log),
        );

    let metrics = if state.config.metrics_require_auth {
        Router::new()
            .route("/metrics", get(metrics_endpoint))
            .route_layer(from_fn_with_state(
                guard(&state, RESOURCE_METRICS).with_action("read"),
                enforce,
            ))
    } else {
        Router::new().route("/metrics", get(metrics_endpoint))
    };

    let api = Router::new()
        .merge(auth)
        .merge(profile)
        .merge(admin)
        .merge(audit_read)
        .merge(audit_list)
        .merge(metrics)
        .layer(from_fn_with_state(
            RateLimitState {
                engine: state.rate_limiter.clone(),
                settings: state.config.rate_limit.clone(),
                trust_proxy: state.config.trust_proxy,
            },
            rate_limit,
        ));

    let health = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz));

    Router::new()
        .merge(api)
        .merge(health)
        .fallback(not_found)
        .layer(from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(cors_layer(&state))
        .with_state(state)
}
