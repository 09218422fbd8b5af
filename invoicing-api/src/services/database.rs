//! Database service for invoicing-api.
//!
//! Every invoice mutation runs as one transaction: invoice row, child rows
//! and exactly one activity row commit together or not at all. Cached totals
//! on the invoice row are recomputed from current state inside the same
//! transaction, never patched directly.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    ActivityAction, Client, Company, CreateClient, CreateInvoice, Invoice, InvoiceActivity,
    InvoiceFilter, InvoiceItem, InvoiceList, InvoicePayment, InvoicePdf, InvoiceStatus,
    InvoiceSummary, InvoiceTemplate, InvoiceWithTotals, LineItemInput, PageMeta, PaymentTerms,
    RecordPayment, TaxMode, TaxScope, UpdateClient, UpdateInvoice, UpsertCompany,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
use crate::services::totals::{compute_totals, round2, LineCharge, Totals, TotalsConfig};

const INVOICE_COLUMNS: &str = "invoice_id, owner_id, invoice_number, status, company_id, client_id, client_name, currency, \
     issue_date, due_date, payment_terms, payment_terms_custom_days, po_number, memo, notes, \
     terms_conditions, late_fee_percent, late_fee_fixed, shipping_amount, tax_mode, tax_scope, \
     invoice_tax_percent, template, ach_routing, ach_account, wire_iban, wire_swift, payment_link, \
     check_payable_to, subtotal, discount_total, tax_total, total, paid_amount, due_amount, \
     created_utc, updated_utc";

const ITEM_COLUMNS: &str = "item_id, invoice_id, title, description, quantity, unit_price, tax_percent, \
     discount_percent, sort_order, created_utc";

const PAYMENT_COLUMNS: &str =
    "payment_id, invoice_id, amount, paid_on, method, note, created_utc";

/// Human-readable invoice number: `INV-{year}-{n}` zero-padded to 4 digits.
/// Numbers past 9999 simply grow in digit count.
pub fn format_invoice_number(year: i32, number: i64) -> String {
    format!("INV-{}-{:04}", year, number)
}

/// Resolve the custom-days field for a set of payment terms: CUSTOM keeps the
/// new value, else the existing one, else 0; every other terms value clears
/// the field to NULL.
pub fn resolve_custom_days(
    terms: PaymentTerms,
    new_days: Option<i32>,
    existing_days: Option<i32>,
) -> Option<i32> {
    match terms {
        PaymentTerms::Custom => Some(new_days.or(existing_days).unwrap_or(0)),
        _ => None,
    }
}

fn totals_config_of(invoice: &Invoice) -> TotalsConfig {
    TotalsConfig {
        tax_mode: TaxMode::from_string(&invoice.tax_mode),
        tax_scope: TaxScope::from_string(&invoice.tax_scope),
        invoice_tax_percent: invoice.invoice_tax_percent,
        shipping_amount: invoice.shipping_amount,
    }
}

fn totals_of(invoice: &Invoice, items: &[InvoiceItem], payments: &[InvoicePayment]) -> Totals {
    let charges: Vec<LineCharge> = items.iter().map(LineCharge::from).collect();
    let amounts: Vec<Decimal> = payments.iter().map(|p| p.amount).collect();
    compute_totals(&charges, &totals_config_of(invoice), &amounts)
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-api"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice numbering
    // -------------------------------------------------------------------------

    /// Allocate the next invoice number for the given year as a single atomic
    /// increment-and-read. Runs inside the creation transaction, so a failed
    /// create never burns a number and concurrent creators never collide.
    pub async fn allocate_invoice_number(
        tx: &mut PgConnection,
        year: i32,
    ) -> Result<String, AppError> {
        let last_number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (year, last_number)
            VALUES ($1, 1)
            ON CONFLICT (year)
            DO UPDATE SET last_number = invoice_sequences.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(year)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to allocate invoice number: {}", e))
        })?;

        Ok(format_invoice_number(year, last_number))
    }

    // -------------------------------------------------------------------------
    // Invoice lifecycle
    // -------------------------------------------------------------------------

    /// Create an invoice with its line items, allocating the next number for
    /// the current year. Returns `None` when the referenced company or client
    /// does not exist for this owner.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_invoice(
        &self,
        owner_id: Uuid,
        input: &CreateInvoice,
    ) -> Result<Option<InvoiceWithTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let company_owned: Option<Uuid> =
            sqlx::query_scalar("SELECT company_id FROM companies WHERE owner_id = $1 AND company_id = $2")
                .bind(owner_id)
                .bind(input.company_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check company: {}", e))
                })?;
        if company_owned.is_none() {
            return Ok(None);
        }

        let client_name: Option<String> =
            sqlx::query_scalar("SELECT name FROM clients WHERE owner_id = $1 AND client_id = $2")
                .bind(owner_id)
                .bind(input.client_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check client: {}", e))
                })?;
        let client_name = match client_name {
            Some(name) => name,
            None => return Ok(None),
        };

        let year = Utc::now().year();
        let invoice_number = Self::allocate_invoice_number(&mut tx, year).await?;

        let config = TotalsConfig {
            tax_mode: input.tax_mode.unwrap_or_default(),
            tax_scope: input.tax_scope.unwrap_or_default(),
            invoice_tax_percent: input.invoice_tax_percent.unwrap_or(Decimal::ZERO),
            shipping_amount: input.shipping_amount.unwrap_or(Decimal::ZERO),
        };
        let charges: Vec<LineCharge> = input.items.iter().map(LineCharge::from).collect();
        let totals = compute_totals(&charges, &config, &[]);

        let status = input.status.unwrap_or(InvoiceStatus::Draft);
        let payment_terms = input.payment_terms.unwrap_or(PaymentTerms::Net30);
        let custom_days =
            resolve_custom_days(payment_terms, input.payment_terms_custom_days, None);

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, owner_id, invoice_number, status, company_id, client_id, client_name,
                currency, issue_date, due_date, payment_terms, payment_terms_custom_days,
                po_number, memo, notes, terms_conditions, late_fee_percent, late_fee_fixed,
                shipping_amount, tax_mode, tax_scope, invoice_tax_percent, template,
                ach_routing, ach_account, wire_iban, wire_swift, payment_link, check_payable_to,
                subtotal, discount_total, tax_total, total, paid_amount, due_amount
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34, $35
            )
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(owner_id)
        .bind(&invoice_number)
        .bind(status.as_str())
        .bind(input.company_id)
        .bind(input.client_id)
        .bind(&client_name)
        .bind(input.currency.as_deref().unwrap_or("USD"))
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(payment_terms.as_str())
        .bind(custom_days)
        .bind(&input.po_number)
        .bind(&input.memo)
        .bind(&input.notes)
        .bind(&input.terms_conditions)
        .bind(input.late_fee_percent)
        .bind(input.late_fee_fixed)
        .bind(config.shipping_amount)
        .bind(config.tax_mode.as_str())
        .bind(config.tax_scope.as_str())
        .bind(config.invoice_tax_percent)
        .bind(input.template.unwrap_or(InvoiceTemplate::Classic).as_str())
        .bind(&input.ach_routing)
        .bind(&input.ach_account)
        .bind(&input.wire_iban)
        .bind(&input.wire_swift)
        .bind(&input.payment_link)
        .bind(&input.check_payable_to)
        .bind(totals.subtotal)
        .bind(totals.discount_total)
        .bind(totals.tax_total)
        .bind(totals.total)
        .bind(totals.paid_amount)
        .bind(totals.due_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already allocated",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let items = Self::insert_items(&mut tx, invoice_id, &input.items).await?;

        Self::insert_activity(
            &mut tx,
            invoice_id,
            owner_id,
            ActivityAction::Create,
            json!({ "invoice_number": invoice_number }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&[status.as_str()]).inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[&invoice.currency])
            .inc_by(totals.total.to_f64().unwrap_or(0.0));
        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        Ok(Some(InvoiceWithTotals {
            invoice,
            items,
            payments: Vec::new(),
            totals,
        }))
    }

    /// Get one invoice with items, payments and freshly computed totals.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceWithTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE owner_id = $1 AND invoice_id = $2"
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let invoice = match invoice {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let items = Self::fetch_items(&self.pool, invoice_id).await?;
        let payments = Self::fetch_payments(&self.pool, invoice_id).await?;
        let totals = totals_of(&invoice, &items, &payments);

        timer.observe_duration();

        Ok(Some(InvoiceWithTotals {
            invoice,
            items,
            payments,
            totals,
        }))
    }

    /// Update an invoice. A supplied items collection replaces the existing
    /// rows entirely; payments are never touched, but the recomputed totals
    /// include them.
    #[instrument(skip(self, patch), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        patch: &UpdateInvoice,
    ) -> Result<Option<InvoiceWithTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE owner_id = $1 AND invoice_id = $2 FOR UPDATE"
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let existing = match existing {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let client_id = patch.client_id.unwrap_or(existing.client_id);
        let client_name = if client_id == existing.client_id {
            existing.client_name.clone()
        } else {
            let name: Option<String> = sqlx::query_scalar(
                "SELECT name FROM clients WHERE owner_id = $1 AND client_id = $2",
            )
            .bind(owner_id)
            .bind(client_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check client: {}", e))
            })?;
            match name {
                Some(name) => name,
                None => return Ok(None),
            }
        };

        let items = match &patch.items {
            Some(new_items) => {
                sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
                    .bind(invoice_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!("Failed to replace items: {}", e))
                    })?;
                Self::insert_items(&mut tx, invoice_id, new_items).await?
            }
            None => Self::fetch_items(&mut *tx, invoice_id).await?,
        };
        let payments = Self::fetch_payments(&mut *tx, invoice_id).await?;

        let config = TotalsConfig {
            tax_mode: patch
                .tax_mode
                .unwrap_or_else(|| TaxMode::from_string(&existing.tax_mode)),
            tax_scope: patch
                .tax_scope
                .unwrap_or_else(|| TaxScope::from_string(&existing.tax_scope)),
            invoice_tax_percent: patch
                .invoice_tax_percent
                .unwrap_or(existing.invoice_tax_percent),
            shipping_amount: patch.shipping_amount.unwrap_or(existing.shipping_amount),
        };
        let charges: Vec<LineCharge> = items.iter().map(LineCharge::from).collect();
        let amounts: Vec<Decimal> = payments.iter().map(|p| p.amount).collect();
        let totals = compute_totals(&charges, &config, &amounts);

        let payment_terms = patch
            .payment_terms
            .unwrap_or_else(|| PaymentTerms::from_string(&existing.payment_terms));
        let custom_days = resolve_custom_days(
            payment_terms,
            patch.payment_terms_custom_days,
            existing.payment_terms_custom_days,
        );

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_id = $3,
                client_name = $4,
                issue_date = $5,
                due_date = $6,
                payment_terms = $7,
                payment_terms_custom_days = $8,
                currency = $9,
                po_number = $10,
                memo = $11,
                notes = $12,
                terms_conditions = $13,
                late_fee_percent = $14,
                late_fee_fixed = $15,
                shipping_amount = $16,
                tax_mode = $17,
                tax_scope = $18,
                invoice_tax_percent = $19,
                template = $20,
                ach_routing = $21,
                ach_account = $22,
                wire_iban = $23,
                wire_swift = $24,
                payment_link = $25,
                check_payable_to = $26,
                subtotal = $27,
                discount_total = $28,
                tax_total = $29,
                total = $30,
                paid_amount = $31,
                due_amount = $32,
                updated_utc = NOW()
            WHERE owner_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .bind(client_id)
        .bind(&client_name)
        .bind(patch.issue_date.unwrap_or(existing.issue_date))
        .bind(patch.due_date.unwrap_or(existing.due_date))
        .bind(payment_terms.as_str())
        .bind(custom_days)
        .bind(patch.currency.as_deref().unwrap_or(&existing.currency))
        .bind(patch.po_number.as_deref().or(existing.po_number.as_deref()))
        .bind(patch.memo.as_deref().or(existing.memo.as_deref()))
        .bind(patch.notes.as_deref().or(existing.notes.as_deref()))
        .bind(
            patch
                .terms_conditions
                .as_deref()
                .or(existing.terms_conditions.as_deref()),
        )
        .bind(patch.late_fee_percent.or(existing.late_fee_percent))
        .bind(patch.late_fee_fixed.or(existing.late_fee_fixed))
        .bind(config.shipping_amount)
        .bind(config.tax_mode.as_str())
        .bind(config.tax_scope.as_str())
        .bind(config.invoice_tax_percent)
        .bind(
            patch
                .template
                .map(|t| t.as_str())
                .unwrap_or(existing.template.as_str()),
        )
        .bind(patch.ach_routing.as_deref().or(existing.ach_routing.as_deref()))
        .bind(patch.ach_account.as_deref().or(existing.ach_account.as_deref()))
        .bind(patch.wire_iban.as_deref().or(existing.wire_iban.as_deref()))
        .bind(patch.wire_swift.as_deref().or(existing.wire_swift.as_deref()))
        .bind(
            patch
                .payment_link
                .as_deref()
                .or(existing.payment_link.as_deref()),
        )
        .bind(
            patch
                .check_payable_to
                .as_deref()
                .or(existing.check_payable_to.as_deref()),
        )
        .bind(totals.subtotal)
        .bind(totals.discount_total)
        .bind(totals.tax_total)
        .bind(totals.total)
        .bind(totals.paid_amount)
        .bind(totals.due_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        Self::insert_activity(
            &mut tx,
            invoice_id,
            owner_id,
            ActivityAction::Update,
            json!({ "fields": patch.changed_fields() }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Invoice updated");

        Ok(Some(InvoiceWithTotals {
            invoice,
            items,
            payments,
            totals,
        }))
    }

    /// Set an invoice's status. Any status may transition to any other by
    /// explicit caller action; no legality check is enforced here.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn change_status(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<InvoiceWithTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["change_status"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $3, updated_utc = NOW()
            WHERE owner_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to change status: {}", e)))?;

        let invoice = match invoice {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let items = Self::fetch_items(&mut *tx, invoice_id).await?;
        let payments = Self::fetch_payments(&mut *tx, invoice_id).await?;
        let totals = totals_of(&invoice, &items, &payments);

        Self::insert_activity(
            &mut tx,
            invoice_id,
            owner_id,
            ActivityAction::StatusChange,
            json!({ "status": status.as_str() }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, status = status.as_str(), "Invoice status changed");

        Ok(Some(InvoiceWithTotals {
            invoice,
            items,
            payments,
            totals,
        }))
    }

    /// Record a payment against an invoice. Payments are append-only. When
    /// the resulting due amount reaches zero the status is forced to `paid`,
    /// whatever it was before (a canceled invoice included).
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn record_payment(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: &RecordPayment,
    ) -> Result<Option<InvoiceWithTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE owner_id = $1 AND invoice_id = $2 FOR UPDATE"
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let existing = match existing {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let payment_id = Uuid::new_v4();
        sqlx::query_as::<_, InvoicePayment>(&format!(
            r#"
            INSERT INTO invoice_payments (payment_id, invoice_id, amount, paid_on, method, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#,
        ))
        .bind(payment_id)
        .bind(invoice_id)
        .bind(input.amount)
        .bind(input.date)
        .bind(input.method.as_str())
        .bind(&input.note)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let items = Self::fetch_items(&mut *tx, invoice_id).await?;
        let payments = Self::fetch_payments(&mut *tx, invoice_id).await?;
        let totals = totals_of(&existing, &items, &payments);

        let status = if totals.due_amount <= Decimal::ZERO {
            InvoiceStatus::Paid.as_str().to_string()
        } else {
            existing.status.clone()
        };

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET subtotal = $3,
                discount_total = $4,
                tax_total = $5,
                total = $6,
                paid_amount = $7,
                due_amount = $8,
                status = $9,
                updated_utc = NOW()
            WHERE owner_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .bind(totals.subtotal)
        .bind(totals.discount_total)
        .bind(totals.tax_total)
        .bind(totals.total)
        .bind(totals.paid_amount)
        .bind(totals.due_amount)
        .bind(&status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update totals: {}", e)))?;

        Self::insert_activity(
            &mut tx,
            invoice_id,
            owner_id,
            ActivityAction::PaymentRecorded,
            json!({
                "amount": input.amount,
                "method": input.method.as_str(),
                "date": input.date,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        PAYMENTS_TOTAL
            .with_label_values(&[input.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[&invoice.currency])
            .inc_by(input.amount.to_f64().unwrap_or(0.0));
        info!(
            invoice_id = %invoice.invoice_id,
            amount = %input.amount,
            method = input.method.as_str(),
            "Payment recorded"
        );

        Ok(Some(InvoiceWithTotals {
            invoice,
            items,
            payments,
            totals,
        }))
    }

    /// List invoices for an owner with filters, sorting and pagination, plus
    /// the owner-wide dashboard summary.
    #[instrument(skip(self, filter), fields(owner_id = %owner_id))]
    pub async fn list_invoices(
        &self,
        owner_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<InvoiceList, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let page = filter.page.max(1);
        let page_size = filter.page_size.clamp(1, 100);
        let offset = (page - 1) * page_size;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        // Sort column and direction come from fixed whitelists, never from
        // raw user input.
        let filter_clause = r#"
            owner_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::varchar IS NULL OR currency = $3)
              AND ($4::numeric IS NULL OR total >= $4)
              AND ($5::numeric IS NULL OR total <= $5)
              AND ($6::date IS NULL OR issue_date >= $6)
              AND ($7::date IS NULL OR issue_date <= $7)
              AND ($8::text IS NULL
                   OR invoice_number ILIKE '%' || $8 || '%'
                   OR memo ILIKE '%' || $8 || '%'
                   OR notes ILIKE '%' || $8 || '%'
                   OR client_name ILIKE '%' || $8 || '%')
        "#;

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {filter_clause} ORDER BY {} {} LIMIT $9 OFFSET $10",
            filter.sort_by.column(),
            filter.sort_dir.keyword(),
        ))
        .bind(owner_id)
        .bind(&status_str)
        .bind(&filter.currency)
        .bind(filter.min_total)
        .bind(filter.max_total)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(&filter.search)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let total_items: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM invoices WHERE {filter_clause}"
        ))
        .bind(owner_id)
        .bind(&status_str)
        .bind(&filter.currency)
        .bind(filter.min_total)
        .bind(filter.max_total)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(&filter.search)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count invoices: {}", e)))?;

        let ids: Vec<Uuid> = invoices.iter().map(|i| i.invoice_id).collect();
        let mut items_by_invoice = Self::fetch_items_grouped(&self.pool, &ids).await?;
        let mut payments_by_invoice = Self::fetch_payments_grouped(&self.pool, &ids).await?;

        let data = invoices
            .into_iter()
            .map(|invoice| {
                let items = items_by_invoice
                    .remove(&invoice.invoice_id)
                    .unwrap_or_default();
                let payments = payments_by_invoice
                    .remove(&invoice.invoice_id)
                    .unwrap_or_default();
                let totals = totals_of(&invoice, &items, &payments);
                InvoiceWithTotals {
                    invoice,
                    items,
                    payments,
                    totals,
                }
            })
            .collect();

        let summary = self.invoice_summary(owner_id).await?;

        timer.observe_duration();

        Ok(InvoiceList {
            data,
            meta: PageMeta {
                page,
                page_size,
                total_items,
                total_pages: (total_items + page_size - 1) / page_size,
            },
            summary,
        })
    }

    /// Dashboard aggregates over the full owner scope, independent of any
    /// list filters.
    async fn invoice_summary(&self, owner_id: Uuid) -> Result<InvoiceSummary, AppError> {
        let total_outstanding: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(due_amount) FROM invoices WHERE owner_id = $1 AND due_amount > 0",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum outstanding: {}", e))
        })?;

        let cutoff = Utc::now().date_naive() - chrono::Duration::days(30);
        let paid_last_30_days: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(p.amount)
            FROM invoice_payments p
            JOIN invoices i ON i.invoice_id = p.invoice_id
            WHERE i.owner_id = $1 AND p.paid_on >= $2
            "#,
        )
        .bind(owner_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum recent payments: {}", e))
        })?;

        let overdue_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE owner_id = $1 AND status = 'overdue'",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count overdue: {}", e)))?;

        let draft_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE owner_id = $1 AND status = 'draft'",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count drafts: {}", e)))?;

        Ok(InvoiceSummary {
            total_outstanding: round2(total_outstanding.unwrap_or(Decimal::ZERO)),
            paid_last_30_days: round2(paid_last_30_days.unwrap_or(Decimal::ZERO)),
            overdue_count,
            draft_count,
        })
    }

    // -------------------------------------------------------------------------
    // PDF render records & activity log
    // -------------------------------------------------------------------------

    /// Record a PDF render for an invoice, allocating the next version
    /// number. The render itself happens outside this core.
    #[instrument(skip(self, url), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn record_pdf(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        url: &str,
    ) -> Result<Option<InvoicePdf>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_pdf"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT invoice_id FROM invoices WHERE owner_id = $1 AND invoice_id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;
        if owned.is_none() {
            return Ok(None);
        }

        let pdf = sqlx::query_as::<_, InvoicePdf>(
            r#"
            INSERT INTO invoice_pdfs (pdf_id, invoice_id, version, url)
            SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3
            FROM invoice_pdfs
            WHERE invoice_id = $2
            RETURNING pdf_id, invoice_id, version, url, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record PDF: {}", e)))?;

        Self::insert_activity(
            &mut tx,
            invoice_id,
            owner_id,
            ActivityAction::PdfGenerated,
            json!({ "version": pdf.version, "url": url }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, version = pdf.version, "PDF render recorded");

        Ok(Some(pdf))
    }

    /// List the activity log for an invoice, newest first.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn list_activities(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Vec<InvoiceActivity>>, AppError> {
        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT invoice_id FROM invoices WHERE owner_id = $1 AND invoice_id = $2",
        )
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;
        if owned.is_none() {
            return Ok(None);
        }

        let activities = sqlx::query_as::<_, InvoiceActivity>(
            r#"
            SELECT activity_id, invoice_id, owner_id, action, meta, created_utc
            FROM invoice_activities
            WHERE invoice_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list activities: {}", e))
        })?;

        Ok(Some(activities))
    }

    // -------------------------------------------------------------------------
    // Clients
    // -------------------------------------------------------------------------

    /// List clients for an owner, newest first.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_clients(&self, owner_id: Uuid) -> Result<Vec<Client>, AppError> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, owner_id, name, email, address_line1, address_line2, city, state,
                postal_code, country, tax_id_label, tax_id_value, notes, created_utc, updated_utc
            FROM clients
            WHERE owner_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        Ok(clients)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, owner_id, name, email, address_line1, address_line2, city, state,
                postal_code, country, tax_id_label, tax_id_value, notes, created_utc, updated_utc
            FROM clients
            WHERE owner_id = $1 AND client_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        Ok(client)
    }

    /// Create a client.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_client(
        &self,
        owner_id: Uuid,
        input: &CreateClient,
    ) -> Result<Client, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                client_id, owner_id, name, email, address_line1, address_line2, city, state,
                postal_code, country, tax_id_label, tax_id_value, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING client_id, owner_id, name, email, address_line1, address_line2, city, state,
                postal_code, country, tax_id_label, tax_id_value, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_id_label)
        .bind(&input.tax_id_value)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)))?;

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                address_line1 = COALESCE($5, address_line1),
                address_line2 = COALESCE($6, address_line2),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                postal_code = COALESCE($9, postal_code),
                country = COALESCE($10, country),
                tax_id_label = COALESCE($11, tax_id_label),
                tax_id_value = COALESCE($12, tax_id_value),
                notes = COALESCE($13, notes),
                updated_utc = NOW()
            WHERE owner_id = $1 AND client_id = $2
            RETURNING client_id, owner_id, name, email, address_line1, address_line2, city, state,
                postal_code, country, tax_id_label, tax_id_value, notes, created_utc, updated_utc
            "#,
        )
        .bind(owner_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_id_label)
        .bind(&input.tax_id_value)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)))?;

        Ok(client)
    }

    /// Delete a client.
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn delete_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM clients WHERE owner_id = $1 AND client_id = $2")
            .bind(owner_id)
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Client has invoices and cannot be deleted"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e)),
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = %client_id, "Client deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Company
    // -------------------------------------------------------------------------

    /// Get the owner's company profile.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn get_company(&self, owner_id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            SELECT company_id, owner_id, name, email, phone, address_line1, address_line2, city,
                state, postal_code, country, logo_url, bank_details, tax_id_label, tax_id_value,
                time_zone, created_utc, updated_utc
            FROM companies
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get company: {}", e)))?;

        Ok(company)
    }

    /// Create or replace the owner's company profile. One row per owner,
    /// enforced by a unique constraint on owner_id.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn upsert_company(
        &self,
        owner_id: Uuid,
        input: &UpsertCompany,
    ) -> Result<Company, AppError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (
                company_id, owner_id, name, email, phone, address_line1, address_line2, city,
                state, postal_code, country, logo_url, bank_details, tax_id_label, tax_id_value,
                time_zone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (owner_id)
            DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address_line1 = EXCLUDED.address_line1,
                address_line2 = EXCLUDED.address_line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                country = EXCLUDED.country,
                logo_url = EXCLUDED.logo_url,
                bank_details = EXCLUDED.bank_details,
                tax_id_label = EXCLUDED.tax_id_label,
                tax_id_value = EXCLUDED.tax_id_value,
                time_zone = EXCLUDED.time_zone,
                updated_utc = NOW()
            RETURNING company_id, owner_id, name, email, phone, address_line1, address_line2, city,
                state, postal_code, country, logo_url, bank_details, tax_id_label, tax_id_value,
                time_zone, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.logo_url)
        .bind(&input.bank_details)
        .bind(&input.tax_id_label)
        .bind(&input.tax_id_value)
        .bind(&input.time_zone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Company already exists for this owner"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to upsert company: {}", e)),
        })?;

        info!(company_id = %company.company_id, "Company saved");

        Ok(company)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn insert_items(
        tx: &mut PgConnection,
        invoice_id: Uuid,
        items: &[LineItemInput],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let mut rows = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let row = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_items (
                    item_id, invoice_id, title, description, quantity, unit_price,
                    tax_percent, discount_percent, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {ITEM_COLUMNS}
                "#,
            ))
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_percent.unwrap_or(Decimal::ZERO))
            .bind(item.discount_percent.unwrap_or(Decimal::ZERO))
            .bind(index as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    async fn insert_activity(
        tx: &mut PgConnection,
        invoice_id: Uuid,
        owner_id: Uuid,
        action: ActivityAction,
        meta: serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invoice_activities (activity_id, invoice_id, owner_id, action, meta)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(owner_id)
        .bind(action.as_str())
        .bind(meta)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to append activity: {}", e))
        })?;
        Ok(())
    }

    async fn fetch_items<'e, E>(executor: E, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as::<_, InvoiceItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = $1 ORDER BY sort_order, created_utc"
        ))
        .bind(invoice_id)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))
    }

    async fn fetch_payments<'e, E>(
        executor: E,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoicePayment>, AppError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as::<_, InvoicePayment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM invoice_payments WHERE invoice_id = $1 ORDER BY paid_on, created_utc"
        ))
        .bind(invoice_id)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payments: {}", e)))
    }

    async fn fetch_items_grouped(
        pool: &PgPool,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<InvoiceItem>>, AppError> {
        if invoice_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, InvoiceItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY sort_order, created_utc"
        ))
        .bind(invoice_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        let mut grouped: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.invoice_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn fetch_payments_grouped(
        pool: &PgPool,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<InvoicePayment>>, AppError> {
        if invoice_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, InvoicePayment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM invoice_payments WHERE invoice_id = ANY($1) ORDER BY paid_on, created_utc"
        ))
        .bind(invoice_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payments: {}", e)))?;

        let mut grouped: HashMap<Uuid, Vec<InvoicePayment>> = HashMap::new();
        for row in rows {
            grouped.entry(row.invoice_id).or_default().push(row);
        }
        Ok(grouped)
    }
}
