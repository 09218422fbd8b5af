//! Activity log model for invoicing-api.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Action kind recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Update,
    StatusChange,
    PaymentRecorded,
    PdfGenerated,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::StatusChange => "status_change",
            ActivityAction::PaymentRecorded => "payment_recorded",
            ActivityAction::PdfGenerated => "pdf_generated",
        }
    }
}

/// Append-only audit trail entry. Exactly one row is written per mutation,
/// inside the same transaction as the mutation itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceActivity {
    pub activity_id: Uuid,
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub action: String,
    pub meta: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}
