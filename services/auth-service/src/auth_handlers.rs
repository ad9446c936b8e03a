use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use common_audit::{AuditEventType, NewAuditEntry};
use common_auth::{AuthContext, ROLE_USER};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::CookieSettings;
use crate::extract::{JsonBody, RequestContext};
use crate::tokens::IssuedToken;
use crate::user_handlers::{
    canonical_email, find_user, hash_password, map_db_error, normalize_email, verify_password,
    verify_unknown_account, User, USER_COLUMNS,
};
use crate::AppState;

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub expires_at: String,
    pub user: SessionUser,
}

#[derive(FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    roles: Vec<String>,
    active: bool,
    password_hash: String,
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("invalid_credentials", "Invalid credentials")
}

pub async fn register(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<(StatusCode, Json<RegisteredUser>)> {
    let email = normalize_email(&body.email)?;
    let password_hash = hash_password(&body.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, email, password_hash, roles)
         VALUES ($1, $2, $3, $4)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(password_hash)
    .bind(vec![ROLE_USER.to_string()])
    .fetch_one(&state.db)
    .await
    .map_err(map_db_error)?;

    info!(user_id = %user.id, "User registered");
    state
        .record_audit(
            NewAuditEntry::new(
                AuditEventType::DataWrite,
                json!({ "action": "register", "email": user.email }),
            )
            .with_user(user.id)
            .with_context(&ctx),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            email: user.email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<Response> {
    let email = canonical_email(&body.email);

    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, email, roles, active, password_hash FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let Some(row) = row else {
        verify_unknown_account(&body.password);
        state.record_login_metric("unknown_user");
        return Err(invalid_credentials());
    };

    if !verify_password(&body.password, &row.password_hash) {
        warn!(user_id = %row.id, "Login rejected: bad password");
        state.record_login_metric("bad_password");
        return Err(invalid_credentials());
    }

    if !row.active {
        warn!(user_id = %row.id, "Login rejected: account inactive");
        state.record_login_metric("inactive");
        return Err(invalid_credentials());
    }

    let user = SessionUser {
        id: row.id,
        email: row.email,
        roles: row.roles,
    };
    let response = issue_session(&state, user)?;

    state.record_login_metric("success");
    state
        .record_audit(
            NewAuditEntry::new(AuditEventType::Login, json!({ "email": email }))
                .with_user(row.id)
                .with_context(&ctx),
        )
        .await;

    Ok(response)
}

/// Reissue a token for a still-valid credential, picking up the user's current roles.
pub async fn refresh_session(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Response> {
    let subject = auth.claims.subject;
    let user = match find_user(&state, subject).await? {
        Some(user) if user.active => user,
        _ => {
            warn!(user_id = %subject, "Refresh rejected: user missing or inactive");
            return Err(ApiError::unauthorized(
                "invalid_token",
                "invalid or expired token",
            ));
        }
    };

    issue_session(
        &state,
        SessionUser {
            id: user.id,
            email: user.email,
            roles: user.roles,
        },
    )
}

pub async fn logout(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    auth: Option<AuthContext>,
) -> ApiResult<Response> {
    if let Some(auth) = auth {
        state
            .record_audit(
                NewAuditEntry::new(AuditEventType::Logout, json!({}))
                    .with_user(auth.claims.subject)
                    .with_context(&ctx),
            )
            .await;
    }

    let cookie = header_value(clear_session_cookie(&state.config.cookie))?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}

fn issue_session(state: &AppState, user: SessionUser) -> ApiResult<Response> {
    let IssuedToken {
        token,
        expires_at,
        expires_in,
        token_type,
    } = state.token_signer.issue(user.id, &user.roles).map_err(|err| {
        error!(user_id = %user.id, error = ?err, "Failed to issue token");
        ApiError::internal("Unable to issue authentication token.")
    })?;

    let cookie = header_value(session_cookie(&state.config.cookie, &token))?;
    let body = SessionResponse {
        token,
        token_type,
        expires_in,
        expires_at: format_timestamp(expires_at),
        user,
    };

    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn header_value(cookie: String) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&cookie).map_err(ApiError::internal)
}

fn cookie_attributes(settings: &CookieSettings, max_age: u64) -> String {
    let mut attrs = format!(
        "Path=/; HttpOnly; SameSite={}; Max-Age={max_age}",
        settings.same_site.as_str()
    );
    if let Some(domain) = &settings.domain {
        attrs.push_str("; Domain=");
        attrs.push_str(domain);
    }
    // Browsers drop SameSite=None cookies without Secure.
    if settings.secure || settings.same_site == crate::config::CookieSameSite::None {
        attrs.push_str("; Secure");
    }
    attrs
}

pub fn session_cookie(settings: &CookieSettings, token: &str) -> String {
    format!(
        "{}={token}; {}",
        settings.name,
        cookie_attributes(settings, settings.max_age.as_secs())
    )
}

pub fn clear_session_cookie(settings: &CookieSettings) -> String {
    format!("{}=; {}", settings.name, cookie_attributes(settings, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CookieSameSite;
    use std::time::Duration;

    fn settings() -> CookieSettings {
        CookieSettings {
            name: "jid".to_string(),
            max_age: Duration::from_secs(7 * 86_400),
            domain: None,
            secure: false,
            same_site: CookieSameSite::Lax,
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&settings(), "abc.def.ghi");
        assert_eq!(
            cookie,
            "jid=abc.def.ghi; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800"
        );
    }

    #[test]
    fn secure_and_domain_are_appended() {
        let mut settings = settings();
        settings.domain = Some("example.com".into());
        settings.secure = true;
        let cookie = session_cookie(&settings, "t");
        assert!(cookie.ends_with("; Domain=example.com; Secure"));
    }

    #[test]
    fn same_site_none_forces_secure() {
        let mut settings = settings();
        settings.same_site = CookieSameSite::None;
        assert!(session_cookie(&settings, "t").contains("; Secure"));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&settings());
        assert!(cookie.starts_with("jid=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
