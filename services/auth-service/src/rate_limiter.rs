use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_audit::client_ip;
use common_http_errors::ApiError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::RateLimitSettings;

/// Upper bound on distinct client keys held in memory.
pub const MAX_TRACKED_KEYS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub current: i64,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

#[async_trait]
pub trait RateLimiterEngine: Send + Sync {
    async fn check(&self, key: &str, limit: u32) -> Result<RateDecision>;
}

/// Fixed-window counter per key, local to this process.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    inner: Arc<Mutex<HashMap<String, (i64, Instant)>>>,
    window: Duration,
    max_keys: usize,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration) -> Self {
        Self::with_max_keys(window, MAX_TRACKED_KEYS)
    }

    pub fn with_max_keys(window: Duration, max_keys: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), window, max_keys: max_keys.max(1) }
    }

    pub async fn tracked_keys(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl RateLimiterEngine for InMemoryRateLimiter {
    async fn check(&self, key: &str, limit: u32) -> Result<RateDecision> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let window = self.window;
        if !guard.contains_key(key) && guard.len() >= self.max_keys {
            guard.retain(|_, (_, started)| now.duration_since(*started) < window);
            if guard.len() >= self.max_keys {
                let oldest = guard
                    .iter()
                    .min_by_key(|(_, (_, started))| *started)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    guard.remove(&oldest);
                }
            }
        }
        let entry = guard.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= window {
            *entry = (0, now);
        }
        entry.0 += 1;
        let current = entry.0;
        let allowed = current <= i64::from(limit);
        let reset_after = window.saturating_sub(now.duration_since(entry.1));
        Ok(RateDecision { allowed, current, reset_after })
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub engine: Arc<dyn RateLimiterEngine>,
    pub settings: RateLimitSettings,
    pub trust_proxy: bool,
}

fn client_key(req: &Request, trust_proxy: bool) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    client_ip(req.headers(), peer, trust_proxy).unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let key = client_key(&req, state.trust_proxy);
    match state.engine.check(&key, state.settings.max_requests).await {
        Ok(decision) if !decision.allowed => {
            warn!(client = %key, current = decision.current, "rate limit exceeded");
            let retry_after_secs = decision.reset_after.as_secs().max(1);
            ApiError::TooManyRequests { message: state.settings.message.clone(), retry_after_secs }
                .into_response()
        }
        Ok(_) => next.run(req).await,
        Err(err) => {
            warn!(error = ?err, "rate limiter unavailable, allowing request");
            next.run(req).await
        }
    }
}
