use std::sync::Arc;

use axum::extract::FromRef;
use common_audit::{AuditSink, NewAuditEntry, SENSITIVE_FIELDS};
use common_auth::JwtVerifier;
use common_security::PermissionTable;
use sqlx::PgPool;
use tracing::warn;

use crate::config::ServiceConfig;
use crate::metrics::AuthMetrics;
use crate::rate_limiter::RateLimiterEngine;
use crate::tokens::TokenSigner;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub token_signer: Arc<TokenSigner>,
    pub permissions: Arc<PermissionTable>,
    pub config: Arc<ServiceConfig>,
    pub audit: Arc<dyn AuditSink>,
    pub rate_limiter: Arc<dyn RateLimiterEngine>,
    pub metrics: Arc<AuthMetrics>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<AuthMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl AppState {
    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    /// Best-effort audit write. Failures are logged and never surface to the caller.
    pub async fn record_audit(&self, entry: NewAuditEntry) {
        let event_type = entry.event_type;
        let user_id = entry.user_id;
        if let Err(err) = self.audit.record(entry.masked(SENSITIVE_FIELDS)).await {
            warn!(
                ?err,
                event_type = event_type.as_str(),
                user_id = ?user_id,
                "Failed to record audit entry"
            );
        }
    }
}
