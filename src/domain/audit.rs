//! Append-only history of ledger writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Transaction, TransactionStatus};
use crate::validation::ValidationError;

pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    StatusChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::StatusChanged => "status_changed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AuditAction::Created),
            "status_changed" => Ok(AuditAction::StatusChanged),
            _ => Err(ValidationError::new("action", "must be created or status_changed")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub transaction_id: String,
    pub action: AuditAction,
    pub old_status: Option<TransactionStatus>,
    pub new_status: TransactionStatus,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn created(tx: &Transaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: tx.transaction_id.clone(),
            action: AuditAction::Created,
            old_status: None,
            new_status: tx.status,
            actor: SYSTEM_ACTOR.to_string(),
            recorded_at: tx.created_at,
        }
    }

    pub fn status_changed(before: TransactionStatus, after: &Transaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: after.transaction_id.clone(),
            action: AuditAction::StatusChanged,
            old_status: Some(before),
            new_status: after.status,
            actor: SYSTEM_ACTOR.to_string(),
            recorded_at: after.updated_at,
        }
    }
}
