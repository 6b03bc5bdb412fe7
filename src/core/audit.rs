use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    ContributionAdded,
    ContributionEdited,
    DueDateExtended,
}

/// Append-only audit entry. Written by the service, displayed by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLog {
    /// Display name or email of the acting user, supplied by the caller.
    pub user: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub content: String,
}

impl TransactionLog {
    pub fn new(user: &str, kind: LogKind, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            timestamp,
            kind,
            content: content.into(),
        }
    }
}
