mod support;

use std::sync::Arc;

use anyhow::Result;
use auth_service::audit_store::PgAuditStore;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use support::{bearer_for, seed_user, test_config, test_state, TestDatabase, TEST_SERVICE_TOKEN};
use tower::util::ServiceExt;
use uuid::Uuid;

async fn call(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn request(method: &str, uri: &str, auth: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, auth);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request")
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn admin_manages_roles_and_status() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = test_state(pool.clone(), test_config(&[]), Arc::new(PgAuditStore::new(pool.clone())));
    let app = auth_service::build_router(state.clone());

    let admin = seed_user(&pool, &unique_email("admin"), &["admin"]).await?;
    let target = seed_user(&pool, &unique_email("target"), &["user"]).await?;
    let admin_auth = bearer_for(&state, admin.user_id, &["admin"]);

    let (status, body) = call(&app, request("GET", "/v1/admin/users?page=1&limit=500", &admin_auth, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 500);
    assert!(body["total"].as_i64().unwrap_or_default() >= 2);

    let (status, _) = call(&app, request("GET", "/v1/admin/users?page=0", &admin_auth, None)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let roles_uri = format!("/v1/admin/users/{}/roles", target.user_id);
    let (status, body) = call(
        &app,
        request("PATCH", &roles_uri, &admin_auth, Some(json!({ "roles": ["auditor", "user", "auditor"] }))),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["auditor", "user"]));

    let (status, body) = call(&app, request("PATCH", &roles_uri, &admin_auth, Some(json!({ "roles": [] })))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Roles must be a non-empty array.");

    let missing_uri = format!("/v1/admin/users/{}/roles", Uuid::new_v4());
    let (status, _) = call(&app, request("PATCH", &missing_uri, &admin_auth, Some(json!({ "roles": ["user"] })))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status_uri = format!("/v1/admin/users/{}/status", target.user_id);
    let (status, body) = call(&app, request("PATCH", &status_uri, &admin_auth, Some(json!({ "active": "no" })))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Active must be a boolean.");

    let (status, body) = call(&app, request("PATCH", &status_uri, &admin_auth, Some(json!({ "active": false })))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let changes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND event_type = 'CONFIG_CHANGE'",
    )
    .bind(admin.user_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(changes, 2);

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn audit_log_lifecycle() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = test_state(pool.clone(), test_config(&[]), Arc::new(PgAuditStore::new(pool.clone())));
    let app = auth_service::build_router(state.clone());

    let subject = Uuid::new_v4();
    let write = |event_type: &str| {
        Request::builder()
            .method("POST")
            .uri("/v1/audit/logs")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-service-token", TEST_SERVICE_TOKEN)
            .body(Body::from(
                json!({
                    "userId": subject,
                    "eventType": event_type,
                    "details": { "token": "abc", "step": event_type }
                })
                .to_string(),
            ))
            .expect("request")
    };

    let (status, first) = call(&app, write("LOGIN")).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["details"]["token"], "***");
    assert_eq!(first["source"], "auth-service");
    let (status, _) = call(&app, write("DATA_READ")).await?;
    assert_eq!(status, StatusCode::CREATED);

    let auditor = bearer_for(&state, Uuid::new_v4(), &["auditor"]);
    let admin = bearer_for(&state, Uuid::new_v4(), &["admin"]);

    let uri = format!("/v1/audit/logs?userId={subject}");
    let (status, body) = call(&app, request("GET", &uri, &auditor, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["logs"][0]["eventType"], "DATA_READ");

    let uri = format!("/v1/audit/logs?userId={subject}&eventType=LOGIN&dateFrom=2000-01-01");
    let (status, body) = call(&app, request("GET", &uri, &auditor, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = call(&app, request("GET", "/v1/audit/logs?dateTo=yesterday", &auditor, None)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = first["id"].as_str().unwrap_or_default().to_string();
    let entry_uri = format!("/v1/audit/logs/{id}");
    let (status, body) = call(&app, request("GET", &entry_uri, &auditor, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _) = call(&app, request("DELETE", &entry_uri, &auditor, None)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, request("DELETE", &entry_uri, &admin, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Audit entry deleted successfully");

    let (status, body) = call(&app, request("GET", &entry_uri, &auditor, None)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Audit entry not found");

    let (status, _) = call(&app, request("DELETE", &entry_uri, &admin, None)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    db.teardown().await?;
    Ok(())
}
