use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_SOURCE: &str = "auth-service";
pub const MASKED_VALUE: &str = "***";
/// Detail keys masked before any entry written by the service is persisted.
pub const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType { Login, Logout, DataRead, DataWrite, ConfigChange, Error, System }

impl AuditEventType {
    pub const ALL: [AuditEventType; 7] = [
        AuditEventType::Login, AuditEventType::Logout, AuditEventType::DataRead, AuditEventType::DataWrite,
        AuditEventType::ConfigChange, AuditEventType::Error, AuditEventType::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Login => "LOGIN",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::DataRead => "DATA_READ",
            AuditEventType::DataWrite => "DATA_WRITE",
            AuditEventType::ConfigChange => "CONFIG_CHANGE",
            AuditEventType::Error => "ERROR",
            AuditEventType::System => "SYSTEM",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = AuditError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == s).ok_or_else(|| AuditError::UnknownEventType(s.to_string()))
    }
}

/// Persisted audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub details: Value,
    pub source: String,
    pub ip_address: Option<String>,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub details: Value,
    pub source: String,
    pub ip_address: Option<String>,
    pub request_id: Option<String>,
}

impl NewAuditEntry {
    pub fn new(event_type: AuditEventType, details: Value) -> Self {
        Self { user_id: None, event_type, details, source: DEFAULT_SOURCE.to_string(), ip_address: None, request_id: None }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self { self.user_id = Some(user_id); self }

    pub fn with_context(mut self, ctx: &crate::AuditContext) -> Self {
        self.ip_address = ctx.ip_address.clone();
        self.request_id = ctx.request_id.clone();
        self
    }

    /// Details must be a JSON object.
    pub fn validate(&self) -> AuditResult<()> {
        if self.details.is_object() { Ok(()) } else { Err(AuditError::InvalidDetails) }
    }

    pub fn masked(mut self, fields: &[&str]) -> Self { mask_sensitive(&mut self.details, fields); self }
}

/// Replace the listed top-level detail keys with `***` when they carry a value.
pub fn mask_sensitive(details: &mut Value, fields: &[&str]) {
    let Value::Object(map) = details else { return; };
    for field in fields {
        if let Some(value) = map.get_mut(*field) {
            let present = match value {
                Value::Null | Value::Bool(false) => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            };
            if present { *value = Value::String(MASKED_VALUE.to_string()); }
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("unknown audit event type '{0}'")]
    UnknownEventType(String),
    #[error("audit details must be a JSON object")]
    InvalidDetails,
    #[error("audit storage error: {0}")]
    Storage(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_wire_names() {
        assert_eq!(serde_json::to_value(AuditEventType::ConfigChange).unwrap(), json!("CONFIG_CHANGE"));
        assert_eq!("DATA_READ".parse::<AuditEventType>().unwrap(), AuditEventType::DataRead);
        assert!("data_read".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn masks_only_populated_fields() {
        let mut details = json!({"password": "hunter2", "token": "", "secret": null, "email": "a@b.c"});
        mask_sensitive(&mut details, SENSITIVE_FIELDS);
        assert_eq!(details, json!({"password": "***", "token": "", "secret": null, "email": "a@b.c"}));
    }

    #[test]
    fn non_object_details_are_rejected() {
        let entry = NewAuditEntry::new(AuditEventType::System, json!("boot"));
        assert!(matches!(entry.validate(), Err(AuditError::InvalidDetails)));
        assert!(NewAuditEntry::new(AuditEventType::System, json!({})).validate().is_ok());
    }
}
