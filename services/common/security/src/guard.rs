use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_auth::{credential_from_headers, JwtVerifier};
use tracing::{debug, warn};

use crate::error::SecurityError;
use crate::gate::{authorize, Action};
use crate::policy::PermissionTable;

/// Per-route authentication and authorization check.
///
/// The resource is always explicit. The action is explicit when set with
/// [`RouteGuard::with_action`], otherwise it comes from the request method.
#[derive(Clone)]
pub struct RouteGuard {
    verifier: Arc<JwtVerifier>,
    table: Arc<PermissionTable>,
    resource: &'static str,
    action: Option<&'static str>,
}

impl RouteGuard {
    pub fn new(
        verifier: Arc<JwtVerifier>,
        table: Arc<PermissionTable>,
        resource: &'static str,
    ) -> Self {
        Self {
            verifier,
            table,
            resource,
            action: None,
        }
    }

    pub fn with_action(mut self, action: &'static str) -> Self {
        self.action = Some(action);
        self
    }

    /// Run the check against an incoming request, attaching the verified claims on success.
    pub fn check(&self, request: &mut Request) -> Result<(), SecurityError> {
        let token =
            credential_from_headers(request.headers(), &self.verifier.config().cookie_name)?;
        let claims = self.verifier.verify(&token)?;

        let action = match self.action {
            Some(action) => action,
            None => match Action::from_method(request.method()) {
                Some(action) => action.as_str(),
                None => {
                    debug!(
                        method = %request.method(),
                        resource = self.resource,
                        "no action for method"
                    );
                    return Err(SecurityError::Forbidden);
                }
            },
        };

        if !authorize(&self.table, &claims, self.resource, action).is_allowed() {
            warn!(
                subject = %claims.subject,
                resource = self.resource,
                action,
                "authorization denied"
            );
            return Err(SecurityError::Forbidden);
        }

        request.extensions_mut().insert(claims);
        Ok(())
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`.
pub async fn enforce(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.check(&mut request) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
