use crate::{AuditEntry, AuditResult, NewAuditEntry};
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use std::net::IpAddr;
use tracing::debug;
use uuid::Uuid;

/// Request metadata copied onto audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub request_id: Option<String>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry>;
}

/// Accepts and discards entries; stamps them as a store would.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        entry.validate()?;
        debug!(event_type = entry.event_type.as_str(), "audit entry discarded");
        Ok(AuditEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            event_type: entry.event_type,
            details: entry.details,
            source: entry.source,
            ip_address: entry.ip_address,
            request_id: entry.request_id,
            timestamp: Utc::now(),
        })
    }
}

fn header_str(map: &HeaderMap, name: &str) -> Option<String> {
    map.get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Client address for a request. Forwarding headers (first `X-Forwarded-For` hop, then
/// `X-Real-IP`) are only honoured when `trust_proxy` is set; otherwise the socket peer is used.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> Option<String> {
    let forwarded = || {
        header_str(headers, "X-Forwarded-For")
            .and_then(|raw| raw.split(',').next().map(|hop| hop.trim().to_string()))
            .filter(|hop| !hop.is_empty())
            .or_else(|| header_str(headers, "X-Real-IP"))
    };
    let from_proxy = if trust_proxy { forwarded() } else { None };
    from_proxy.or_else(|| peer.map(|ip| ip.to_string()))
}

pub fn extract_context_from_headers(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> AuditContext {
    let ip_address = client_ip(headers, peer, trust_proxy);
    let request_id = header_str(headers, "X-Request-ID");
    AuditContext { ip_address, request_id }
}
