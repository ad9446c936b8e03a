use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::AuthError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error(transparent)]
    Authentication(#[from] AuthError),
    #[error("forbidden")]
    Forbidden,
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        match self {
            SecurityError::Authentication(err) => err.into_response(),
            SecurityError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "code": "forbidden", "message": "forbidden" })),
            )
                .into_response(),
        }
    }
}
