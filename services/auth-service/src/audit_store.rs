use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_audit::{AuditEntry, AuditError, AuditEventType, AuditResult, AuditSink, NewAuditEntry};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::pagination::Page;

const AUDIT_COLUMNS: &str =
    "id, user_id, event_type, details, source, ip_address, request_id, occurred_at";

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    user_id: Option<Uuid>,
    event_type: String,
    details: Value,
    source: String,
    ip_address: Option<String>,
    request_id: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            user_id: row.user_id,
            event_type: row.event_type.parse()?,
            details: row.details,
            source: row.source,
            ip_address: row.ip_address,
            request_id: row.request_id,
            timestamp: row.occurred_at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    builder.push(" WHERE TRUE");
    if let Some(event_type) = filter.event_type {
        builder.push(" AND event_type = ");
        builder.push_bind(event_type.as_str());
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND occurred_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND occurred_at <= ");
        builder.push_bind(to);
    }
}

fn storage(err: sqlx::Error) -> AuditError {
    AuditError::Storage(err.to_string())
}

fn into_entries(rows: Vec<AuditRow>) -> AuditResult<Vec<AuditEntry>> {
    rows.into_iter().map(AuditEntry::try_from).collect()
}

/// Newest first, plus the total matching `filter`.
pub async fn list_entries(
    pool: &PgPool,
    filter: &AuditFilter,
    page: &Page,
) -> AuditResult<(Vec<AuditEntry>, i64)> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
    push_filters(&mut count, filter);
    let total: i64 = count
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(storage)?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs"));
    push_filters(&mut select, filter);
    select.push(" ORDER BY occurred_at DESC, id DESC LIMIT ");
    select.push_bind(i64::from(page.limit));
    select.push(" OFFSET ");
    select.push_bind(page.offset());

    let rows = select
        .build_query_as::<AuditRow>()
        .fetch_all(pool)
        .await
        .map_err(storage)?;

    Ok((into_entries(rows)?, total))
}

pub async fn find_entry(pool: &PgPool, id: Uuid) -> AuditResult<Option<AuditEntry>> {
    let row = sqlx::query_as::<_, AuditRow>(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(storage)?;

    row.map(AuditEntry::try_from).transpose()
}

/// Returns whether a row was removed.
pub async fn delete_entry(pool: &PgPool, id: Uuid) -> AuditResult<bool> {
    let result = sqlx::query("DELETE FROM audit_logs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(storage)?;
    Ok(result.rows_affected() > 0)
}

#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditStore {
    async fn record(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        entry.validate()?;

        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "INSERT INTO audit_logs (id, user_id, event_type, details, source, ip_address, request_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {AUDIT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.event_type.as_str())
        .bind(&entry.details)
        .bind(&entry.source)
        .bind(&entry.ip_address)
        .bind(&entry.request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        AuditEntry::try_from(row)
    }
}
