//! Invoice lifecycle integration tests.
//!
//! Database-backed; run with `DATABASE_URL` set and `cargo test -- --ignored`.

mod common;

use chrono::{Datelike, Utc};
use common::{line, line_with, TestDb};
use invoicing_api::models::{InvoiceStatus, PaymentMethod, PaymentTerms, RecordPayment, UpdateInvoice};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn create_assigns_number_and_defaults() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(80), dec!(120))]))
        .await
        .expect("create failed")
        .expect("company and client exist");

    let year = Utc::now().year();
    assert!(created
        .invoice
        .invoice_number
        .starts_with(&format!("INV-{}-", year)));
    assert_eq!(created.invoice.status, "draft");
    assert_eq!(created.invoice.currency, "USD");
    assert_eq!(created.invoice.payment_terms, "net_30");
    assert_eq!(created.totals.total, dec!(9600.00));
    assert_eq!(created.totals.due_amount, dec!(9600.00));
    assert_eq!(created.items.len(), 1);
    assert!(created.payments.is_empty());
}

#[tokio::test]
#[ignore]
async fn create_with_unknown_client_reports_not_found() {
    let harness = TestDb::spawn().await;

    let mut input = harness.create_input(vec![line(dec!(1), dec!(100))]);
    input.client_id = Uuid::new_v4();

    let result = harness
        .db
        .create_invoice(harness.owner_id, &input)
        .await
        .expect("create failed");

    assert!(result.is_none());
}

#[tokio::test]
#[ignore]
async fn sequential_creates_get_increasing_numbers() {
    let harness = TestDb::spawn().await;

    let first = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(10))]))
        .await
        .expect("create failed")
        .expect("exists");
    let second = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(10))]))
        .await
        .expect("create failed")
        .expect("exists");

    let suffix = |number: &str| -> i64 {
        number
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .expect("numeric suffix")
    };

    assert_ne!(first.invoice.invoice_number, second.invoice.invoice_number);
    assert!(suffix(&second.invoice.invoice_number) > suffix(&first.invoice.invoice_number));
}

#[tokio::test]
#[ignore]
async fn concurrent_creates_never_share_a_number() {
    let harness = TestDb::spawn().await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let db = harness.db.clone();
        let owner_id = harness.owner_id;
        let input = harness.create_input(vec![line(dec!(1), dec!(10))]);
        handles.push(tokio::spawn(async move {
            db.create_invoice(owner_id, &input)
                .await
                .expect("create failed")
                .expect("exists")
                .invoice
                .invoice_number
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.expect("task panicked"));
    }
    numbers.sort();
    numbers.dedup();

    assert_eq!(numbers.len(), 5);
}

#[tokio::test]
#[ignore]
async fn update_replaces_items_and_keeps_payments() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(10), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    for amount in [dec!(300), dec!(200)] {
        harness
            .db
            .record_payment(
                harness.owner_id,
                created.invoice.invoice_id,
                &RecordPayment {
                    amount,
                    date: created.invoice.issue_date,
                    method: PaymentMethod::Ach,
                    note: None,
                },
            )
            .await
            .expect("payment failed")
            .expect("exists");
    }

    let patch = UpdateInvoice {
        items: Some(vec![line(dec!(20), dec!(100))]),
        ..UpdateInvoice::default()
    };
    let updated = harness
        .db
        .update_invoice(harness.owner_id, created.invoice.invoice_id, &patch)
        .await
        .expect("update failed")
        .expect("exists");

    // New total, but the 500 already paid still counts.
    assert_eq!(updated.totals.total, dec!(2000.00));
    assert_eq!(updated.totals.paid_amount, dec!(500.00));
    assert_eq!(updated.totals.due_amount, dec!(1500.00));
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].quantity, dec!(20));
    assert_eq!(updated.payments.len(), 2);
}

#[tokio::test]
#[ignore]
async fn update_resolves_custom_payment_terms() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let patch = UpdateInvoice {
        payment_terms: Some(PaymentTerms::Custom),
        payment_terms_custom_days: Some(21),
        ..UpdateInvoice::default()
    };
    let updated = harness
        .db
        .update_invoice(harness.owner_id, created.invoice.invoice_id, &patch)
        .await
        .expect("update failed")
        .expect("exists");

    assert_eq!(updated.invoice.payment_terms, "custom");
    assert_eq!(updated.invoice.payment_terms_custom_days, Some(21));

    // Switching back to a preset clears the day count.
    let patch = UpdateInvoice {
        payment_terms: Some(PaymentTerms::Net15),
        ..UpdateInvoice::default()
    };
    let updated = harness
        .db
        .update_invoice(harness.owner_id, created.invoice.invoice_id, &patch)
        .await
        .expect("update failed")
        .expect("exists");

    assert_eq!(updated.invoice.payment_terms, "net_15");
    assert_eq!(updated.invoice.payment_terms_custom_days, None);
}

#[tokio::test]
#[ignore]
async fn change_status_is_reflected_and_logged() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let updated = harness
        .db
        .change_status(harness.owner_id, created.invoice.invoice_id, InvoiceStatus::Sent)
        .await
        .expect("change failed")
        .expect("exists");
    assert_eq!(updated.invoice.status, "sent");

    let activities = harness
        .db
        .list_activities(harness.owner_id, created.invoice.invoice_id)
        .await
        .expect("list failed")
        .expect("exists");

    // Newest first: the status change, then the creation entry.
    assert_eq!(activities[0].action, "status_change");
    assert_eq!(activities[0].meta["status"], "sent");
    assert_eq!(activities.last().expect("non-empty").action, "create");
    assert_eq!(
        activities.last().expect("non-empty").meta["invoice_number"],
        created.invoice.invoice_number.as_str()
    );
}

#[tokio::test]
#[ignore]
async fn update_logs_which_fields_changed() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let patch = UpdateInvoice {
        memo: Some("Updated memo".to_string()),
        shipping_amount: Some(dec!(10)),
        ..UpdateInvoice::default()
    };
    harness
        .db
        .update_invoice(harness.owner_id, created.invoice.invoice_id, &patch)
        .await
        .expect("update failed")
        .expect("exists");

    let activities = harness
        .db
        .list_activities(harness.owner_id, created.invoice.invoice_id)
        .await
        .expect("list failed")
        .expect("exists");

    assert_eq!(activities[0].action, "update");
    let fields = activities[0].meta["fields"]
        .as_array()
        .expect("fields array");
    assert!(fields.iter().any(|f| f == "memo"));
    assert!(fields.iter().any(|f| f == "shipping_amount"));
}

#[tokio::test]
#[ignore]
async fn invoices_are_invisible_to_other_owners() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let other_owner = Uuid::new_v4();
    let result = harness
        .db
        .get_invoice(other_owner, created.invoice.invoice_id)
        .await
        .expect("get failed");

    assert!(result.is_none());
}

#[tokio::test]
#[ignore]
async fn tax_config_snapshot_example_totals_match() {
    let harness = TestDb::spawn().await;

    let mut input = harness.create_input(vec![
        line_with(dec!(40), dec!(150), dec!(8.25), dec!(0)),
        line_with(dec!(10), dec!(200), dec!(8.25), dec!(5)),
    ]);
    input.tax_mode = Some(invoicing_api::models::TaxMode::SalesTax);
    input.shipping_amount = Some(dec!(75));

    let created = harness
        .db
        .create_invoice(harness.owner_id, &input)
        .await
        .expect("create failed")
        .expect("exists");

    assert_eq!(created.totals.subtotal, dec!(8000.00));
    assert_eq!(created.totals.discount_total, dec!(100.00));
    assert_eq!(created.totals.tax_total, dec!(651.75));
    assert_eq!(created.totals.total, dec!(8626.75));
    assert_eq!(created.invoice.total, dec!(8626.75));
}

#[tokio::test]
#[ignore]
async fn pdf_versions_count_up_per_invoice() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let first = harness
        .db
        .record_pdf(
            harness.owner_id,
            created.invoice.invoice_id,
            "https://files.example.com/invoice-v1.pdf",
        )
        .await
        .expect("record failed")
        .expect("exists");
    let second = harness
        .db
        .record_pdf(
            harness.owner_id,
            created.invoice.invoice_id,
            "https://files.example.com/invoice-v2.pdf",
        )
        .await
        .expect("record failed")
        .expect("exists");

    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);

    let activities = harness
        .db
        .list_activities(harness.owner_id, created.invoice.invoice_id)
        .await
        .expect("list failed")
        .expect("exists");
    assert_eq!(activities[0].action, "pdf_generated");
    assert_eq!(activities[0].meta["version"], 2);
}
