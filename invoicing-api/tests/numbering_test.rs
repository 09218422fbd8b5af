//! Invoice number formatting, sequencing and payment-terms resolution tests.

mod common;

use invoicing_api::models::PaymentTerms;
use invoicing_api::services::database::{format_invoice_number, resolve_custom_days, Database};

#[test]
fn invoice_numbers_are_zero_padded_to_four_digits() {
    assert_eq!(format_invoice_number(2026, 1), "INV-2026-0001");
    assert_eq!(format_invoice_number(2026, 42), "INV-2026-0042");
    assert_eq!(format_invoice_number(2026, 9999), "INV-2026-9999");
}

#[test]
fn invoice_numbers_past_9999_grow_in_width() {
    assert_eq!(format_invoice_number(2026, 10000), "INV-2026-10000");
    assert_eq!(format_invoice_number(2026, 123456), "INV-2026-123456");
}

#[tokio::test]
#[ignore]
async fn yearly_sequences_restart_at_one_and_stay_independent() {
    let harness = common::TestDb::spawn().await;

    // Far-future years so real invoice data never collides; the transaction
    // is dropped without commit, so reruns start clean.
    let mut tx = harness
        .db
        .pool()
        .begin()
        .await
        .expect("Failed to begin transaction");

    let first = Database::allocate_invoice_number(&mut tx, 2601)
        .await
        .expect("Failed to allocate");
    let second = Database::allocate_invoice_number(&mut tx, 2601)
        .await
        .expect("Failed to allocate");
    assert_eq!(first, "INV-2601-0001");
    assert_eq!(second, "INV-2601-0002");

    let next_year = Database::allocate_invoice_number(&mut tx, 2602)
        .await
        .expect("Failed to allocate");
    assert_eq!(next_year, "INV-2602-0001");

    let back = Database::allocate_invoice_number(&mut tx, 2601)
        .await
        .expect("Failed to allocate");
    assert_eq!(back, "INV-2601-0003");
}

#[test]
fn custom_terms_keep_new_days_over_existing() {
    assert_eq!(
        resolve_custom_days(PaymentTerms::Custom, Some(45), Some(30)),
        Some(45)
    );
}

#[test]
fn custom_terms_fall_back_to_existing_days() {
    assert_eq!(
        resolve_custom_days(PaymentTerms::Custom, None, Some(30)),
        Some(30)
    );
}

#[test]
fn custom_terms_without_any_days_resolve_to_zero() {
    assert_eq!(resolve_custom_days(PaymentTerms::Custom, None, None), Some(0));
}

#[test]
fn preset_terms_clear_custom_days() {
    for terms in [
        PaymentTerms::Net15,
        PaymentTerms::Net30,
        PaymentTerms::Net45,
        PaymentTerms::Net60,
    ] {
        assert_eq!(resolve_custom_days(terms, Some(45), Some(30)), None);
    }
}
