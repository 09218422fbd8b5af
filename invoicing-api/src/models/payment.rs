//! Payment model for invoicing-api.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Ach,
    Wire,
    Card,
    Check,
    Cash,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Ach => "ach",
            PaymentMethod::Wire => "wire",
            PaymentMethod::Card => "card",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "ach" => PaymentMethod::Ach,
            "wire" => PaymentMethod::Wire,
            "card" => PaymentMethod::Card,
            "check" => PaymentMethod::Check,
            "cash" => PaymentMethod::Cash,
            _ => PaymentMethod::Other,
        }
    }
}

/// Payment recorded against an invoice. Rows are append-only: once created a
/// payment is never edited or removed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicePayment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub method: String,
    pub note: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
}
