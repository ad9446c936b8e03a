pub mod model;
pub mod producer;

pub use model::{mask_sensitive, AuditEntry, AuditError, AuditEventType, AuditResult, NewAuditEntry, DEFAULT_SOURCE, MASKED_VALUE, SENSITIVE_FIELDS};
pub use producer::{client_ip, extract_context_from_headers, AuditContext, AuditSink, NoopAuditSink};
