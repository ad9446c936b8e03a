use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use common_audit::{AuditEntry, AuditError, AuditEventType, NewAuditEntry, SENSITIVE_FIELDS};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit_store::{self, AuditFilter};
use crate::extract::{parse_id, JsonBody};
use crate::pagination::Page;
use crate::AppState;

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";
const DEFAULT_LOG_LIMIT: u32 = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogPage {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub logs: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAuditRequest {
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub details: Value,
    pub source: Option<String>,
    pub ip_address: Option<String>,
    pub request_id: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// RFC 3339 timestamp, or a bare date taken as midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl AuditLogQuery {
    fn filter(&self) -> ApiResult<AuditFilter> {
        let event_type = present(&self.event_type)
            .map(|raw| {
                raw.parse::<AuditEventType>()
                    .map_err(|err| ApiError::bad_request("invalid_event_type", err.to_string()))
            })
            .transpose()?;
        let user_id = present(&self.user_id)
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| ApiError::bad_request("invalid_user_id", "userId must be a UUID"))
            })
            .transpose()?;
        let from = present(&self.date_from)
            .map(|raw| {
                parse_date(raw)
                    .ok_or_else(|| ApiError::bad_request("invalid_date", "dateFrom is not a valid date"))
            })
            .transpose()?;
        let to = present(&self.date_to)
            .map(|raw| {
                parse_date(raw)
                    .ok_or_else(|| ApiError::bad_request("invalid_date", "dateTo is not a valid date"))
            })
            .transpose()?;

        Ok(AuditFilter {
            event_type,
            user_id,
            from,
            to,
        })
    }
}

fn map_audit_error(err: AuditError) -> ApiError {
    match err {
        AuditError::UnknownEventType(_) => {
            ApiError::bad_request("invalid_event_type", err.to_string())
        }
        AuditError::InvalidDetails => ApiError::bad_request("invalid_details", err.to_string()),
        AuditError::Storage(_) => ApiError::internal(err),
    }
}

fn entry_not_found() -> ApiError {
    ApiError::not_found("audit_entry_not_found", "Audit entry not found")
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditLogPage>> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref(), DEFAULT_LOG_LIMIT)?;
    let filter = query.filter()?;

    let (logs, total) = audit_store::list_entries(&state.db, &filter, &page)
        .await
        .map_err(map_audit_error)?;

    Ok(Json(AuditLogPage {
        page: page.page,
        limit: page.limit,
        total,
        logs,
    }))
}

pub async fn get_log(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<AuditEntry>> {
    let id = parse_id(&raw_id)?;
    audit_store::find_entry(&state.db, id)
        .await
        .map_err(map_audit_error)?
        .map(Json)
        .ok_or_else(entry_not_found)
}

pub async fn delete_log(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw_id)?;
    let removed = audit_store::delete_entry(&state.db, id)
        .await
        .map_err(map_audit_error)?;
    if !removed {
        return Err(entry_not_found());
    }

    info!(audit_id = %id, "Audit entry deleted");
    Ok(Json(json!({ "message": "Audit entry deleted successfully" })))
}

fn require_service_token(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let presented = headers
        .get(SERVICE_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    let authorized = match (&state.config.service_token, presented) {
        (Some(expected), Some(presented)) => expected.matches(presented),
        _ => false,
    };
    if authorized {
        Ok(())
    } else {
        warn!("Rejected audit write with missing or invalid service token");
        Err(ApiError::unauthorized(
            "invalid_service_token",
            "Unauthorized service token",
        ))
    }
}

pub async fn record_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<JsonBody<RecordAuditRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<AuditEntry>)> {
    require_service_token(&state, &headers)?;
    let JsonBody(body) = body?;

    let event_type = body.event_type.parse::<AuditEventType>().map_err(map_audit_error)?;
    let mut entry = NewAuditEntry::new(event_type, body.details);
    entry.user_id = body.user_id;
    if let Some(source) = present(&body.source) {
        entry.source = source.to_string();
    }
    entry.ip_address = body.ip_address;
    entry.request_id = body.request_id;

    let stored = state
        .audit
        .record(entry.masked(SENSITIVE_FIELDS))
        .await
        .map_err(map_audit_error)?;

    Ok((StatusCode::CREATED, Json(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_accept_rfc3339_and_plain_days() {
        assert_eq!(
            parse_date("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-03-01T12:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_date("03/01/2024"), None);
    }

    #[test]
    fn query_filters_are_validated() {
        let query = AuditLogQuery {
            event_type: Some("LOGIN".into()),
            date_from: Some("2024-01-01".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.event_type, Some(AuditEventType::Login));
        assert!(filter.from.is_some());
        assert!(filter.user_id.is_none());

        let bad = AuditLogQuery {
            event_type: Some("login".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad.filter(),
            Err(ApiError::BadRequest { code: "invalid_event_type", .. })
        ));

        let bad = AuditLogQuery {
            user_id: Some("42".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad.filter(),
            Err(ApiError::BadRequest { code: "invalid_user_id", .. })
        ));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let query = AuditLogQuery {
            date_to: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap(), AuditFilter::default());
    }
}
