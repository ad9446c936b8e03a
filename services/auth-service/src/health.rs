use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// Ready once the database answers a trivial query.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "database": true }))),
        Err(err) => {
            warn!(error = %err, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "database": false })))
        }
    }
}
