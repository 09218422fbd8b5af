//! Company profile handlers. One company per owner.

use axum::extract::{Json, State};
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::middleware::auth::AuthUser;
use crate::models::{Company, UpsertCompany};
use crate::AppState;

/// Request to create or replace the owner's company profile.
///
/// PUT /company
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertCompanyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
    pub bank_details: Option<String>,
    pub tax_id_label: Option<String>,
    pub tax_id_value: Option<String>,
    pub time_zone: Option<String>,
}

impl From<UpsertCompanyRequest> for UpsertCompany {
    fn from(req: UpsertCompanyRequest) -> Self {
        UpsertCompany {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            logo_url: req.logo_url,
            bank_details: req.bank_details,
            tax_id_label: req.tax_id_label,
            tax_id_value: req.tax_id_value,
            time_zone: req.time_zone,
        }
    }
}

/// Get the owner's company profile.
///
/// GET /company
pub async fn get_company(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Company>, AppError> {
    let company = state
        .db
        .get_company(user.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(company))
}

/// Create or replace the owner's company profile.
///
/// PUT /company
pub async fn upsert_company(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpsertCompanyRequest>,
) -> Result<Json<Company>, AppError> {
    req.validate()?;

    let company = state.db.upsert_company(user.owner_id, &req.into()).await?;

    Ok(Json(company))
}
