//! Listing, filtering, pagination and summary integration tests.
//!
//! Database-backed; run with `DATABASE_URL` set and `cargo test -- --ignored`.

mod common;

use common::{line, TestDb};
use invoicing_api::models::{InvoiceFilter, InvoiceSortBy, InvoiceStatus, SortDir};
use rust_decimal_macros::dec;

#[tokio::test]
#[ignore]
async fn list_filters_by_status() {
    let harness = TestDb::spawn().await;

    let first = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");
    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(200))]))
        .await
        .expect("create failed")
        .expect("exists");
    harness
        .db
        .change_status(harness.owner_id, first.invoice.invoice_id, InvoiceStatus::Sent)
        .await
        .expect("change failed")
        .expect("exists");

    let filter = InvoiceFilter {
        status: Some(InvoiceStatus::Sent),
        page: 1,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert_eq!(list.meta.total_items, 1);
    assert_eq!(list.data[0].invoice.invoice_id, first.invoice.invoice_id);
}

#[tokio::test]
#[ignore]
async fn search_matches_client_name_case_insensitively() {
    let harness = TestDb::spawn().await;

    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let filter = InvoiceFilter {
        search: Some("test cli".to_string()),
        page: 1,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");
    assert_eq!(list.meta.total_items, 1);

    let filter = InvoiceFilter {
        search: Some("no such client".to_string()),
        page: 1,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");
    assert_eq!(list.meta.total_items, 0);
}

#[tokio::test]
#[ignore]
async fn pagination_slices_and_reports_totals() {
    let harness = TestDb::spawn().await;

    for price in [dec!(100), dec!(200), dec!(300), dec!(400), dec!(500)] {
        harness
            .db
            .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), price)]))
            .await
            .expect("create failed")
            .expect("exists");
    }

    let filter = InvoiceFilter {
        sort_by: InvoiceSortBy::Total,
        sort_dir: SortDir::Asc,
        page: 2,
        page_size: 2,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert_eq!(list.meta.total_items, 5);
    assert_eq!(list.meta.total_pages, 3);
    assert_eq!(list.data.len(), 2);
    assert_eq!(list.data[0].totals.total, dec!(300.00));
    assert_eq!(list.data[1].totals.total, dec!(400.00));
}

#[tokio::test]
#[ignore]
async fn out_of_range_page_returns_empty_data_with_meta() {
    let harness = TestDb::spawn().await;

    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let filter = InvoiceFilter {
        page: 99,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert!(list.data.is_empty());
    assert_eq!(list.meta.total_items, 1);
    assert_eq!(list.meta.page, 99);
}

#[tokio::test]
#[ignore]
async fn page_size_is_clamped_to_one_hundred() {
    let harness = TestDb::spawn().await;

    let filter = InvoiceFilter {
        page: 1,
        page_size: 5000,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert_eq!(list.meta.page_size, 100);
}

#[tokio::test]
#[ignore]
async fn summary_spans_the_whole_owner_not_the_page() {
    let harness = TestDb::spawn().await;

    let first = harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");
    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(250))]))
        .await
        .expect("create failed")
        .expect("exists");
    harness
        .db
        .change_status(harness.owner_id, first.invoice.invoice_id, InvoiceStatus::Overdue)
        .await
        .expect("change failed")
        .expect("exists");

    // Filter down to one status; the summary still covers everything.
    let filter = InvoiceFilter {
        status: Some(InvoiceStatus::Overdue),
        page: 1,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert_eq!(list.meta.total_items, 1);
    assert_eq!(list.summary.overdue_count, 1);
    assert_eq!(list.summary.draft_count, 1);
    assert_eq!(list.summary.total_outstanding, dec!(350.00));
}

#[tokio::test]
#[ignore]
async fn list_never_leaks_other_owners_invoices() {
    let harness = TestDb::spawn().await;
    let other = TestDb::spawn().await;

    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");
    other
        .db
        .create_invoice(other.owner_id, &other.create_input(vec![line(dec!(1), dec!(999))]))
        .await
        .expect("create failed")
        .expect("exists");

    let filter = InvoiceFilter {
        page: 1,
        page_size: 10,
        ..InvoiceFilter::default()
    };
    let list = harness
        .db
        .list_invoices(harness.owner_id, &filter)
        .await
        .expect("list failed");

    assert_eq!(list.meta.total_items, 1);
    assert_eq!(list.data[0].totals.total, dec!(100.00));
}
