use axum::{
    extract::{Path, Query, State},
    Json,
};
use common_audit::{AuditEventType, NewAuditEntry};
use common_auth::{is_known_role, AuthContext};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::extract::{parse_id, JsonBody, RequestContext};
use crate::pagination::Page;
use crate::user_handlers::{User, USER_COLUMNS};
use crate::AppState;

const DEFAULT_USER_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub users: Vec<User>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<UserPage>> {
    let page = Page::parse(
        query.page.as_deref(),
        query.limit.as_deref(),
        DEFAULT_USER_LIMIT,
    )?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
    ))
    .bind(i64::from(page.limit))
    .bind(page.offset())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(UserPage {
        page: page.page,
        limit: page.limit,
        total,
        users,
    }))
}

/// Known role names, deduplicated in request order.
fn parse_roles(body: &Value) -> ApiResult<Vec<String>> {
    let invalid = || ApiError::bad_request("invalid_roles", "Roles must be a non-empty array.");
    let items = body
        .get("roles")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(invalid)?;

    let mut roles: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let role = item.as_str().ok_or_else(invalid)?.trim();
        if !is_known_role(role) {
            return Err(ApiError::bad_request(
                "unknown_role",
                format!("Unknown role '{role}'."),
            ));
        }
        if !roles.iter().any(|existing| existing == role) {
            roles.push(role.to_string());
        }
    }
    Ok(roles)
}

pub async fn update_roles(
    State(state): State<AppState>,
    auth: AuthContext,
    RequestContext(ctx): RequestContext,
    Path(raw_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<User>> {
    let user_id = parse_id(&raw_id)?;
    let roles = parse_roles(&body)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET roles = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(&roles)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(user_not_found)?;

    info!(user_id = %user.id, actor = %auth.claims.subject, roles = ?user.roles, "User roles updated");
    record_change(
        &state,
        auth.claims.subject,
        &ctx,
        json!({ "action": "update_roles", "targetUserId": user.id, "roles": user.roles }),
    )
    .await;

    Ok(Json(user))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    RequestContext(ctx): RequestContext,
    Path(raw_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<User>> {
    let user_id = parse_id(&raw_id)?;
    let active = body
        .get("active")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::bad_request("invalid_status", "Active must be a boolean."))?;

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET active = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(active)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(user_not_found)?;

    info!(user_id = %user.id, actor = %auth.claims.subject, active, "User status updated");
    record_change(
        &state,
        auth.claims.subject,
        &ctx,
        json!({ "action": "update_status", "targetUserId": user.id, "active": active }),
    )
    .await;

    Ok(Json(user))
}

fn user_not_found() -> ApiError {
    ApiError::not_found("user_not_found", "User not found.")
}

async fn record_change(
    state: &AppState,
    actor: Uuid,
    ctx: &common_audit::AuditContext,
    details: Value,
) {
    state
        .record_audit(
            NewAuditEntry::new(AuditEventType::ConfigChange, details)
                .with_user(actor)
                .with_context(ctx),
        )
        .await;
}
