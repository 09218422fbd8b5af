//! Services for invoicing-api.

pub mod database;
pub mod jwt;
pub mod metrics;
pub mod totals;
