use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    http_duration: HistogramVec,
    login_attempts: IntCounterVec,
    rejections: IntCounterVec,
}

impl AuthMetrics {
    pub fn new(buckets: &[f64]) -> Result<Self> {
        let registry = Registry::new();

        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_ms", "Duration of HTTP requests in ms")
                .buckets(buckets.to_vec()),
            &["method", "route", "status_code"],
        )?;
        registry.register(Box::new(http_duration.clone()))?;

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new(
                "auth_rejections_total",
                "Requests rejected before reaching a handler",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            registry,
            http_duration,
            login_attempts,
            rejections,
        })
    }

    pub fn observe_request(&self, method: &str, route: &str, status: StatusCode, elapsed_ms: f64) {
        self.http_duration
            .with_label_values(&[method, route, status.as_str()])
            .observe(elapsed_ms);

        let reason = match status {
            StatusCode::UNAUTHORIZED => Some("unauthenticated"),
            StatusCode::FORBIDDEN => Some("forbidden"),
            StatusCode::TOO_MANY_REQUESTS => Some("rate_limited"),
            _ => None,
        };
        if let Some(reason) = reason {
            self.rejections.with_label_values(&[reason]).inc();
        }
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Records `http_request_duration_ms` for every routed request.
pub async fn track_requests(
    State(metrics): State<Arc<AuthMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_owned();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics.observe_request(&method, &route, response.status(), elapsed_ms);
    response
}

pub async fn metrics_endpoint(State(metrics): State<Arc<AuthMetrics>>) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = ?err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
