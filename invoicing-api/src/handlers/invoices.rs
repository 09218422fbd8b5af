//! Invoice lifecycle handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::middleware::auth::AuthUser;
use crate::models::{
    CreateInvoice, InvoiceActivity, InvoiceFilter, InvoiceList, InvoicePdf, InvoiceSortBy,
    InvoiceStatus, InvoiceTemplate, InvoiceWithTotals, LineItemInput, PaymentMethod, PaymentTerms,
    RecordPayment, SortDir, TaxMode, TaxScope, UpdateInvoice,
};
use crate::AppState;

// ============================================================================
// Validation helpers
// ============================================================================

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must be zero or greater"));
    }
    Ok(())
}

fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must be greater than zero"));
    }
    Ok(())
}

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("must be between 0 and 100"));
    }
    Ok(())
}

fn validate_custom_terms(
    terms: Option<PaymentTerms>,
    custom_days: Option<i32>,
) -> Result<(), ValidationError> {
    if terms == Some(PaymentTerms::Custom) && custom_days.is_none() {
        return Err(ValidationError::new(
            "payment_terms_custom_days is required for custom payment terms",
        ));
    }
    Ok(())
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// One line item in a create or update request. Serialize is needed because
/// collection-level validation errors embed the offending value as a param.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    pub quantity: Decimal,
    #[validate(custom(function = "validate_non_negative"))]
    pub unit_price: Decimal,
    #[validate(custom(function = "validate_percent"))]
    pub tax_percent: Option<Decimal>,
    #[validate(custom(function = "validate_percent"))]
    pub discount_percent: Option<Decimal>,
}

impl From<LineItemRequest> for LineItemInput {
    fn from(req: LineItemRequest) -> Self {
        LineItemInput {
            title: req.title,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
            tax_percent: req.tax_percent,
            discount_percent: req.discount_percent,
        }
    }
}

/// Request to create an invoice.
///
/// POST /invoices
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_terms"))]
pub struct CreateInvoiceRequest {
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: Option<InvoiceStatus>,
    pub payment_terms: Option<PaymentTerms>,
    #[validate(range(min = 1, max = 365))]
    pub payment_terms_custom_days: Option<i32>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    #[validate(length(max = 100))]
    pub po_number: Option<String>,
    #[validate(length(max = 2000))]
    pub memo: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(length(max = 10000))]
    pub terms_conditions: Option<String>,
    #[validate(custom(function = "validate_percent"))]
    pub late_fee_percent: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    pub late_fee_fixed: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    pub shipping_amount: Option<Decimal>,
    pub tax_mode: Option<TaxMode>,
    pub tax_scope: Option<TaxScope>,
    #[validate(custom(function = "validate_percent"))]
    pub invoice_tax_percent: Option<Decimal>,
    pub template: Option<InvoiceTemplate>,
    pub ach_routing: Option<String>,
    pub ach_account: Option<String>,
    pub wire_iban: Option<String>,
    pub wire_swift: Option<String>,
    #[validate(url)]
    pub payment_link: Option<String>,
    pub check_payable_to: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<LineItemRequest>,
}

fn validate_create_terms(req: &CreateInvoiceRequest) -> Result<(), ValidationError> {
    validate_custom_terms(req.payment_terms, req.payment_terms_custom_days)
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        CreateInvoice {
            company_id: req.company_id,
            client_id: req.client_id,
            issue_date: req.issue_date,
            due_date: req.due_date,
            status: req.status,
            payment_terms: req.payment_terms,
            payment_terms_custom_days: req.payment_terms_custom_days,
            currency: req.currency,
            po_number: req.po_number,
            memo: req.memo,
            notes: req.notes,
            terms_conditions: req.terms_conditions,
            late_fee_percent: req.late_fee_percent,
            late_fee_fixed: req.late_fee_fixed,
            shipping_amount: req.shipping_amount,
            tax_mode: req.tax_mode,
            tax_scope: req.tax_scope,
            invoice_tax_percent: req.invoice_tax_percent,
            template: req.template,
            ach_routing: req.ach_routing,
            ach_account: req.ach_account,
            wire_iban: req.wire_iban,
            wire_swift: req.wire_swift,
            payment_link: req.payment_link,
            check_payable_to: req.check_payable_to,
            items: req.items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Request to update an invoice. Absent fields are left untouched; a present
/// `items` array replaces all line items.
///
/// PUT /invoices/:invoice_id
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub client_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<PaymentTerms>,
    #[validate(range(min = 1, max = 365))]
    pub payment_terms_custom_days: Option<i32>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    #[validate(length(max = 100))]
    pub po_number: Option<String>,
    #[validate(length(max = 2000))]
    pub memo: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(length(max = 10000))]
    pub terms_conditions: Option<String>,
    #[validate(custom(function = "validate_percent"))]
    pub late_fee_percent: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    pub late_fee_fixed: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    pub shipping_amount: Option<Decimal>,
    pub tax_mode: Option<TaxMode>,
    pub tax_scope: Option<TaxScope>,
    #[validate(custom(function = "validate_percent"))]
    pub invoice_tax_percent: Option<Decimal>,
    pub template: Option<InvoiceTemplate>,
    pub ach_routing: Option<String>,
    pub ach_account: Option<String>,
    pub wire_iban: Option<String>,
    pub wire_swift: Option<String>,
    #[validate(url)]
    pub payment_link: Option<String>,
    pub check_payable_to: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        UpdateInvoice {
            client_id: req.client_id,
            issue_date: req.issue_date,
            due_date: req.due_date,
            payment_terms: req.payment_terms,
            payment_terms_custom_days: req.payment_terms_custom_days,
            currency: req.currency,
            po_number: req.po_number,
            memo: req.memo,
            notes: req.notes,
            terms_conditions: req.terms_conditions,
            late_fee_percent: req.late_fee_percent,
            late_fee_fixed: req.late_fee_fixed,
            shipping_amount: req.shipping_amount,
            tax_mode: req.tax_mode,
            tax_scope: req.tax_scope,
            invoice_tax_percent: req.invoice_tax_percent,
            template: req.template,
            ach_routing: req.ach_routing,
            ach_account: req.ach_account,
            wire_iban: req.wire_iban,
            wire_swift: req.wire_swift,
            payment_link: req.payment_link,
            check_payable_to: req.check_payable_to,
            items: req
                .items
                .map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

/// Request to change an invoice's status.
///
/// POST /invoices/:invoice_id/status
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: InvoiceStatus,
}

/// Request to record a payment.
///
/// POST /invoices/:invoice_id/payments
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Request to record a rendered PDF.
///
/// POST /invoices/:invoice_id/pdfs
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPdfRequest {
    #[validate(url)]
    pub url: String,
}

/// Query parameters for listing invoices.
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub currency: Option<String>,
    pub search: Option<String>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: Option<InvoiceSortBy>,
    pub sort_dir: Option<SortDir>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl From<ListInvoicesQuery> for InvoiceFilter {
    fn from(query: ListInvoicesQuery) -> Self {
        InvoiceFilter {
            status: query.status,
            currency: query.currency,
            search: query.search,
            min_total: query.min_total,
            max_total: query.max_total,
            start_date: query.start_date,
            end_date: query.end_date,
            sort_by: query.sort_by.unwrap_or_default(),
            sort_dir: query.sort_dir.unwrap_or_default(),
            page: query.page.unwrap_or(1),
            page_size: query.page_size.unwrap_or(10),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an invoice.
///
/// POST /invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithTotals>), AppError> {
    req.validate()?;

    let invoice = state
        .db
        .create_invoice(user.owner_id, &req.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company or client not found")))?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Get one invoice with items, payments and totals.
///
/// GET /invoices/:invoice_id
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceWithTotals>, AppError> {
    let invoice = state
        .db
        .get_invoice(user.owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice))
}

/// Update an invoice.
///
/// PUT /invoices/:invoice_id
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceWithTotals>, AppError> {
    req.validate()?;

    let invoice = state
        .db
        .update_invoice(user.owner_id, invoice_id, &req.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice))
}

/// Change an invoice's status.
///
/// POST /invoices/:invoice_id/status
pub async fn change_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<InvoiceWithTotals>, AppError> {
    let invoice = state
        .db
        .change_status(user.owner_id, invoice_id, req.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice))
}

/// Record a payment against an invoice.
///
/// POST /invoices/:invoice_id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<InvoiceWithTotals>), AppError> {
    req.validate()?;

    let payment = RecordPayment {
        amount: req.amount,
        date: req.date,
        method: req.method,
        note: req.note,
    };
    let invoice = state
        .db
        .record_payment(user.owner_id, invoice_id, &payment)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List invoices with filters, sorting, pagination and summary.
///
/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<InvoiceList>, AppError> {
    let list = state.db.list_invoices(user.owner_id, &query.into()).await?;

    Ok(Json(list))
}

/// Record a rendered PDF for an invoice.
///
/// POST /invoices/:invoice_id/pdfs
pub async fn record_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<RecordPdfRequest>,
) -> Result<(StatusCode, Json<InvoicePdf>), AppError> {
    req.validate()?;

    let pdf = state
        .db
        .record_pdf(user.owner_id, invoice_id, &req.url)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok((StatusCode::CREATED, Json(pdf)))
}

/// List an invoice's activity log, newest first.
///
/// GET /invoices/:invoice_id/activities
pub async fn list_activities(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceActivity>>, AppError> {
    let activities = state
        .db
        .list_activities(user.owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(activities))
}
