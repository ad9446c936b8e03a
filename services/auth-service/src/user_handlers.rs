use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use common_audit::{AuditEventType, NewAuditEntry};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use once_cell::sync::Lazy;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::extract::{JsonBody, RequestContext};
use crate::AppState;

pub(crate) const USER_COLUMNS: &str = "id, email, roles, active, created_at";

const MIN_PASSWORD_LEN: usize = 8;
const UNIQUE_VIOLATION: &str = "23505";

/// Hash checked when no account matches, so unknown emails cost the same argon2 work.
static DUMMY_PASSWORD_HASH: Lazy<String> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"no-such-account-placeholder", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_default()
});

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<User>> {
    let user = find_user(&state, auth.claims.subject)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found", "User not found."))?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    RequestContext(ctx): RequestContext,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let ProfileUpdate { email, password } = update;
    if email.is_none() && password.is_none() {
        return Err(ApiError::bad_request(
            "empty_update",
            "Provide an email or password to update.",
        ));
    }

    let email = email.as_deref().map(normalize_email).transpose()?;
    let password_hash = password.as_deref().map(hash_password).transpose()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = now()");
    let mut changed = Vec::new();
    if let Some(email) = email {
        builder.push(", email = ");
        builder.push_bind(email);
        changed.push("email");
    }
    if let Some(hash) = password_hash {
        builder.push(", password_hash = ");
        builder.push_bind(hash);
        changed.push("password");
    }
    builder.push(" WHERE id = ");
    builder.push_bind(auth.claims.subject);
    builder.push(" RETURNING ");
    builder.push(USER_COLUMNS);

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&state.db)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| ApiError::not_found("user_not_found", "User not found."))?;

    info!(user_id = %user.id, fields = ?changed, "Profile updated");
    state
        .record_audit(
            NewAuditEntry::new(
                AuditEventType::DataWrite,
                json!({ "action": "profile_update", "fields": changed }),
            )
            .with_user(user.id)
            .with_context(&ctx),
        )
        .await;

    Ok(Json(user))
}

pub(crate) async fn find_user(state: &AppState, id: Uuid) -> ApiResult<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::internal)
}

/// Unique violations surface as 409; anything else is internal.
pub(crate) fn map_db_error(err: sqlx::Error) -> ApiError {
    let unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        ApiError::conflict("email_taken", "Email already registered")
    } else {
        ApiError::internal(err)
    }
}

/// Lookup form of an email: trimmed and ASCII-lowercased, without validation.
pub(crate) fn canonical_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

pub(crate) fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = canonical_email(raw);
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ApiError::bad_request("invalid_email", "A valid email is required."))
    }
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "invalid_password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {err}")))
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Spends one full verification against a throwaway hash; the outcome is discarded.
pub(crate) fn verify_unknown_account(password: &str) {
    let _ = verify_password(password, &DUMMY_PASSWORD_HASH);
}
