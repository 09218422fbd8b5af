//! Client CRUD handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::AuthUser;
use crate::models::{Client, CreateClient, UpdateClient};
use crate::AppState;

/// Request to create a client.
///
/// POST /clients
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_id_label: Option<String>,
    pub tax_id_value: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<CreateClientRequest> for CreateClient {
    fn from(req: CreateClientRequest) -> Self {
        CreateClient {
            name: req.name,
            email: req.email,
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            tax_id_label: req.tax_id_label,
            tax_id_value: req.tax_id_value,
            notes: req.notes,
        }
    }
}

/// Request to update a client. Absent fields are left untouched.
///
/// PUT /clients/:client_id
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_id_label: Option<String>,
    pub tax_id_value: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<UpdateClientRequest> for UpdateClient {
    fn from(req: UpdateClientRequest) -> Self {
        UpdateClient {
            name: req.name,
            email: req.email,
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            tax_id_label: req.tax_id_label,
            tax_id_value: req.tax_id_value,
            notes: req.notes,
        }
    }
}

/// List clients for the authenticated owner.
///
/// GET /clients
pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = state.db.list_clients(user.owner_id).await?;

    Ok(Json(clients))
}

/// Get one client.
///
/// GET /clients/:client_id
pub async fn get_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(user.owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

/// Create a client.
///
/// POST /clients
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    req.validate()?;

    let client = state.db.create_client(user.owner_id, &req.into()).await?;

    Ok((StatusCode::CREATED, Json(client)))
}

/// Update a client.
///
/// PUT /clients/:client_id
pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    req.validate()?;

    let client = state
        .db
        .update_client(user.owner_id, client_id, &req.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

/// Delete a client.
///
/// DELETE /clients/:client_id
pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_client(user.owner_id, client_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
