use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    request::Parts,
    HeaderMap, HeaderValue,
};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// Verified identity of the caller.
///
/// Reuses the claim attached by an upstream route guard when present, otherwise
/// verifies the presented credential with the shared verifier.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(Self {
                claims: claims.clone(),
            });
        }

        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let token = credential_from_headers(&parts.headers, &verifier.config().cookie_name)?;
        let claims = verifier.verify(&token)?;

        Ok(Self { claims })
    }
}

/// Locate the bearer credential: `Authorization: Bearer` first, then the session cookie.
///
/// A present but malformed Authorization header is treated as a failed credential
/// rather than falling through to the cookie.
pub fn credential_from_headers(headers: &HeaderMap, cookie_name: &str) -> AuthResult<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        return parse_bearer(value);
    }

    cookie_value(headers, cookie_name).ok_or(AuthError::MissingCredential)
}

fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::AuthenticationFailed)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::AuthenticationFailed)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::AuthenticationFailed);
    }

    Ok(token.to_owned())
}

/// Value of the named cookie across all `Cookie` headers, if non-empty.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
