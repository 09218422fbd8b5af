//! PDF render record model for invoicing-api.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One PDF render of an invoice. Versions count up from 1 per invoice; the
/// rendering and file storage themselves are external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicePdf {
    pub pdf_id: Uuid,
    pub invoice_id: Uuid,
    pub version: i32,
    pub url: String,
    pub created_utc: DateTime<Utc>,
}
