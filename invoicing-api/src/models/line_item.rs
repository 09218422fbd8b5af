//! Line item model for invoicing-api.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice. Items are set at creation and replaced wholesale
/// on update; there is no per-line patching.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_percent: Decimal,
    pub discount_percent: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for one invoice line. Percentages default to zero.
#[derive(Debug, Clone)]
pub struct LineItemInput {
    pub title: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_percent: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
}
