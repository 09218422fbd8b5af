//! Domain models for invoicing-api.

mod activity;
mod client;
mod company;
mod invoice;
mod line_item;
mod payment;
mod pdf;

pub use activity::{ActivityAction, InvoiceActivity};
pub use client::{Client, CreateClient, UpdateClient};
pub use company::{Company, UpsertCompany};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceFilter, InvoiceList, InvoiceSortBy, InvoiceStatus,
    InvoiceSummary, InvoiceTemplate, InvoiceWithTotals, PageMeta, PaymentTerms, SortDir, TaxMode,
    TaxScope, UpdateInvoice,
};
pub use line_item::{InvoiceItem, LineItemInput};
pub use payment::{InvoicePayment, PaymentMethod, RecordPayment};
pub use pdf::InvoicePdf;
