//! Shared harness for database-backed tests.
//!
//! These tests need a running PostgreSQL instance and are marked `#[ignore]`;
//! run them with `DATABASE_URL` set and `cargo test -- --ignored`. Every
//! harness gets a fresh random owner, so tests do not see each other's rows.

use chrono::NaiveDate;
use invoicing_api::models::{CreateClient, CreateInvoice, LineItemInput, UpsertCompany};
use invoicing_api::services::database::Database;
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct TestDb {
    pub db: Database,
    pub owner_id: Uuid,
    pub company_id: Uuid,
    pub client_id: Uuid,
}

impl TestDb {
    pub async fn spawn() -> Self {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for database-backed tests");
        let db = Database::new(&url, 5, 1)
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");

        let owner_id = Uuid::new_v4();
        let company = db
            .upsert_company(
                owner_id,
                &UpsertCompany {
                    name: "Test Company".to_string(),
                    email: None,
                    phone: None,
                    address_line1: None,
                    address_line2: None,
                    city: None,
                    state: None,
                    postal_code: None,
                    country: None,
                    logo_url: None,
                    bank_details: None,
                    tax_id_label: None,
                    tax_id_value: None,
                    time_zone: None,
                },
            )
            .await
            .expect("Failed to create test company");
        let client = db
            .create_client(
                owner_id,
                &CreateClient {
                    name: "Test Client".to_string(),
                    email: Some("client@example.com".to_string()),
                    address_line1: None,
                    address_line2: None,
                    city: None,
                    state: None,
                    postal_code: None,
                    country: None,
                    tax_id_label: None,
                    tax_id_value: None,
                    notes: None,
                },
            )
            .await
            .expect("Failed to create test client");

        Self {
            db,
            owner_id,
            company_id: company.company_id,
            client_id: client.client_id,
        }
    }

    /// A creation input with sensible defaults for this harness's company and
    /// client.
    pub fn create_input(&self, items: Vec<LineItemInput>) -> CreateInvoice {
        CreateInvoice {
            company_id: self.company_id,
            client_id: self.client_id,
            issue_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
            status: None,
            payment_terms: None,
            payment_terms_custom_days: None,
            currency: None,
            po_number: None,
            memo: None,
            notes: None,
            terms_conditions: None,
            late_fee_percent: None,
            late_fee_fixed: None,
            shipping_amount: None,
            tax_mode: None,
            tax_scope: None,
            invoice_tax_percent: None,
            template: None,
            ach_routing: None,
            ach_account: None,
            wire_iban: None,
            wire_swift: None,
            payment_link: None,
            check_payable_to: None,
            items,
        }
    }
}

pub fn line(quantity: Decimal, unit_price: Decimal) -> LineItemInput {
    LineItemInput {
        title: "Work".to_string(),
        description: None,
        quantity,
        unit_price,
        tax_percent: None,
        discount_percent: None,
    }
}

pub fn line_with(
    quantity: Decimal,
    unit_price: Decimal,
    tax_percent: Decimal,
    discount_percent: Decimal,
) -> LineItemInput {
    LineItemInput {
        title: "Work".to_string(),
        description: None,
        quantity,
        unit_price,
        tax_percent: Some(tax_percent),
        discount_percent: Some(discount_percent),
    }
}
