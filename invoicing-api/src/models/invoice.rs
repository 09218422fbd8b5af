//! Invoice model for invoicing-api.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{InvoiceItem, InvoicePayment, LineItemInput};
use crate::services::totals::Totals;

/// Invoice status. Transitions are caller-directed; the only automatic
/// transition is to `Paid` when a recorded payment clears the due amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Canceled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Canceled => "canceled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "canceled" => InvoiceStatus::Canceled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Payment terms. `Custom` carries an explicit day count in
/// `payment_terms_custom_days`; every other variant stores NULL there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    Net15,
    Net30,
    Net45,
    Net60,
    Custom,
}

impl PaymentTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::Net15 => "net_15",
            PaymentTerms::Net30 => "net_30",
            PaymentTerms::Net45 => "net_45",
            PaymentTerms::Net60 => "net_60",
            PaymentTerms::Custom => "custom",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "net_15" => PaymentTerms::Net15,
            "net_45" => PaymentTerms::Net45,
            "net_60" => PaymentTerms::Net60,
            "custom" => PaymentTerms::Custom,
            _ => PaymentTerms::Net30,
        }
    }
}

/// Tax mode. `SalesTax` vs `Vat` affects document labeling only; the
/// arithmetic is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    #[default]
    None,
    SalesTax,
    Vat,
}

impl TaxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxMode::None => "none",
            TaxMode::SalesTax => "sales_tax",
            TaxMode::Vat => "vat",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sales_tax" => TaxMode::SalesTax,
            "vat" => TaxMode::Vat,
            _ => TaxMode::None,
        }
    }
}

/// Tax scope: tax computed per line item, or once over the whole invoice's
/// taxable base. In `Invoice` scope any per-line tax percentages are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxScope {
    #[default]
    LineItem,
    Invoice,
}

impl TaxScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxScope::LineItem => "line_item",
            TaxScope::Invoice => "invoice",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "invoice" => TaxScope::Invoice,
            _ => TaxScope::LineItem,
        }
    }
}

/// PDF render template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceTemplate {
    #[default]
    Classic,
    Minimal,
}

impl InvoiceTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceTemplate::Classic => "classic",
            InvoiceTemplate::Minimal => "minimal",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "minimal" => InvoiceTemplate::Minimal,
            _ => InvoiceTemplate::Classic,
        }
    }
}

/// Invoice row. The six monetary fields are a persisted cache of the totals
/// computation and are rewritten on every mutation, never edited directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_terms: String,
    pub payment_terms_custom_days: Option<i32>,
    pub po_number: Option<String>,
    pub memo: Option<String>,
    pub notes: Option<String>,
    pub terms_conditions: Option<String>,
    pub late_fee_percent: Option<Decimal>,
    pub late_fee_fixed: Option<Decimal>,
    pub shipping_amount: Decimal,
    pub tax_mode: String,
    pub tax_scope: String,
    pub invoice_tax_percent: Decimal,
    pub template: String,
    pub ach_routing: Option<String>,
    pub ach_account: Option<String>,
    pub wire_iban: Option<String>,
    pub wire_swift: Option<String>,
    pub payment_link: Option<String>,
    pub check_payable_to: Option<String>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Invoice enriched with its children and freshly computed totals, the shape
/// every lifecycle operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithTotals {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<InvoicePayment>,
    pub totals: Totals,
}

/// Input for creating an invoice. Unset fields fall back to the documented
/// defaults (draft, USD, no tax, line-item scope, classic template, net 30).
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: Option<InvoiceStatus>,
    pub payment_terms: Option<PaymentTerms>,
    pub payment_terms_custom_days: Option<i32>,
    pub currency: Option<String>,
    pub po_number: Option<String>,
    pub memo: Option<String>,
    pub notes: Option<String>,
    pub terms_conditions: Option<String>,
    pub late_fee_percent: Option<Decimal>,
    pub late_fee_fixed: Option<Decimal>,
    pub shipping_amount: Option<Decimal>,
    pub tax_mode: Option<TaxMode>,
    pub tax_scope: Option<TaxScope>,
    pub invoice_tax_percent: Option<Decimal>,
    pub template: Option<InvoiceTemplate>,
    pub ach_routing: Option<String>,
    pub ach_account: Option<String>,
    pub wire_iban: Option<String>,
    pub wire_swift: Option<String>,
    pub payment_link: Option<String>,
    pub check_payable_to: Option<String>,
    pub items: Vec<LineItemInput>,
}

/// Optional-field patch for updating an invoice. A supplied `items`
/// collection wholesale replaces the existing rows; payments are never
/// touched by an update.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<PaymentTerms>,
    pub payment_terms_custom_days: Option<i32>,
    pub currency: Option<String>,
    pub po_number: Option<String>,
    pub memo: Option<String>,
    pub notes: Option<String>,
    pub terms_conditions: Option<String>,
    pub late_fee_percent: Option<Decimal>,
    pub late_fee_fixed: Option<Decimal>,
    pub shipping_amount: Option<Decimal>,
    pub tax_mode: Option<TaxMode>,
    pub tax_scope: Option<TaxScope>,
    pub invoice_tax_percent: Option<Decimal>,
    pub template: Option<InvoiceTemplate>,
    pub ach_routing: Option<String>,
    pub ach_account: Option<String>,
    pub wire_iban: Option<String>,
    pub wire_swift: Option<String>,
    pub payment_link: Option<String>,
    pub check_payable_to: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
}

impl UpdateInvoice {
    /// Names of the fields present in this patch, recorded in the UPDATE
    /// activity entry.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! track {
            ($field:ident) => {
                if self.$field.is_some() {
                    fields.push(stringify!($field));
                }
            };
        }
        track!(client_id);
        track!(issue_date);
        track!(due_date);
        track!(payment_terms);
        track!(payment_terms_custom_days);
        track!(currency);
        track!(po_number);
        track!(memo);
        track!(notes);
        track!(terms_conditions);
        track!(late_fee_percent);
        track!(late_fee_fixed);
        track!(shipping_amount);
        track!(tax_mode);
        track!(tax_scope);
        track!(invoice_tax_percent);
        track!(template);
        track!(ach_routing);
        track!(ach_account);
        track!(wire_iban);
        track!(wire_swift);
        track!(payment_link);
        track!(check_payable_to);
        track!(items);
        fields
    }
}

/// Sortable invoice columns for list queries. The column names are a fixed
/// whitelist; user input never reaches the ORDER BY clause directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSortBy {
    IssueDate,
    DueDate,
    Total,
    Status,
    #[default]
    CreatedAt,
}

impl InvoiceSortBy {
    pub fn column(&self) -> &'static str {
        match self {
            InvoiceSortBy::IssueDate => "issue_date",
            InvoiceSortBy::DueDate => "due_date",
            InvoiceSortBy::Total => "total",
            InvoiceSortBy::Status => "status",
            InvoiceSortBy::CreatedAt => "created_utc",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Filter parameters for listing invoices. Structured filters are
/// AND-combined; the free-text search matches number, memo, notes and client
/// name case-insensitively and is OR-combined internally.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub currency: Option<String>,
    pub search: Option<String>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: InvoiceSortBy,
    pub sort_dir: SortDir,
    pub page: i64,
    pub page_size: i64,
}

/// Pagination metadata for a list response.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// Dashboard aggregates computed over the full owner scope, independent of
/// the current page's filters so the numbers stay stable while paging.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub total_outstanding: Decimal,
    pub paid_last_30_days: Decimal,
    pub overdue_count: i64,
    pub draft_count: i64,
}

/// A page of invoices plus metadata and owner-wide summary.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceList {
    pub data: Vec<InvoiceWithTotals>,
    pub meta: PageMeta,
    pub summary: InvoiceSummary,
}
