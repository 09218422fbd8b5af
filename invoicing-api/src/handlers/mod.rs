//! HTTP handlers for invoicing-api.

pub mod app;
pub mod clients;
pub mod companies;
pub mod invoices;
pub mod metrics;
