//! Company model for invoicing-api.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The issuing company. One per owner, enforced by a unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub company_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub logo_url: Option<String>,
    pub bank_details: Option<String>,
    pub tax_id_label: Option<String>,
    pub tax_id_value: Option<String>,
    pub time_zone: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating or replacing the owner's company profile.
#[derive(Debug, Clone)]
pub struct UpsertCompany {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub logo_url: Option<String>,
    pub bank_details: Option<String>,
    pub tax_id_label: Option<String>,
    pub tax_id_value: Option<String>,
    pub time_zone: Option<String>,
}
