use axum::http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Client-facing authentication failures. Verification detail is never carried here.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredential,
    #[error("invalid or expired token")]
    AuthenticationFailed,
    #[error("invalid auth configuration: {0}")]
    Config(&'static str),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingCredential => (StatusCode::UNAUTHORIZED, "authentication_required"),
            AuthError::AuthenticationFailed => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let message = if status == StatusCode::UNAUTHORIZED {
            self.to_string()
        } else {
            "Internal Server Error".to_string()
        };

        let mut response = (status, Json(ErrorBody { code, message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
