//! Client and company integration tests.
//!
//! Database-backed; run with `DATABASE_URL` set and `cargo test -- --ignored`.

mod common;

use common::{line, TestDb};
use invoicing_api::models::{CreateClient, UpdateClient, UpsertCompany};
use rust_decimal_macros::dec;
use service_core::error::AppError;
use uuid::Uuid;

fn client_input(name: &str) -> CreateClient {
    CreateClient {
        name: name.to_string(),
        email: None,
        address_line1: None,
        address_line2: None,
        city: None,
        state: None,
        postal_code: None,
        country: None,
        tax_id_label: None,
        tax_id_value: None,
        notes: None,
    }
}

#[tokio::test]
#[ignore]
async fn clients_are_scoped_to_their_owner() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_client(harness.owner_id, &client_input("Acme Corp"))
        .await
        .expect("create failed");

    let clients = harness
        .db
        .list_clients(harness.owner_id)
        .await
        .expect("list failed");
    assert!(clients.iter().any(|c| c.client_id == created.client_id));

    let other_owner = Uuid::new_v4();
    let result = harness
        .db
        .get_client(other_owner, created.client_id)
        .await
        .expect("get failed");
    assert!(result.is_none());
}

#[tokio::test]
#[ignore]
async fn update_client_patches_only_supplied_fields() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_client(harness.owner_id, &client_input("Acme Corp"))
        .await
        .expect("create failed");

    let patch = UpdateClient {
        email: Some("billing@acme.example".to_string()),
        ..UpdateClient::default()
    };
    let updated = harness
        .db
        .update_client(harness.owner_id, created.client_id, &patch)
        .await
        .expect("update failed")
        .expect("exists");

    assert_eq!(updated.name, "Acme Corp");
    assert_eq!(updated.email.as_deref(), Some("billing@acme.example"));
}

#[tokio::test]
#[ignore]
async fn deleting_a_client_with_invoices_conflicts() {
    let harness = TestDb::spawn().await;

    harness
        .db
        .create_invoice(harness.owner_id, &harness.create_input(vec![line(dec!(1), dec!(100))]))
        .await
        .expect("create failed")
        .expect("exists");

    let result = harness
        .db
        .delete_client(harness.owner_id, harness.client_id)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore]
async fn deleting_an_unused_client_succeeds() {
    let harness = TestDb::spawn().await;

    let created = harness
        .db
        .create_client(harness.owner_id, &client_input("Short Lived"))
        .await
        .expect("create failed");

    let deleted = harness
        .db
        .delete_client(harness.owner_id, created.client_id)
        .await
        .expect("delete failed");
    assert!(deleted);

    let gone = harness
        .db
        .get_client(harness.owner_id, created.client_id)
        .await
        .expect("get failed");
    assert!(gone.is_none());
}

#[tokio::test]
#[ignore]
async fn company_upsert_replaces_the_single_profile() {
    let harness = TestDb::spawn().await;

    let replaced = harness
        .db
        .upsert_company(
            harness.owner_id,
            &UpsertCompany {
                name: "Renamed Company".to_string(),
                email: Some("hello@renamed.example".to_string()),
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
        .expect("upsert failed");

    // Same row as the harness company, new contents.
    assert_eq!(replaced.company_id, harness.company_id);
    assert_eq!(replaced.name, "Renamed Company");

    let fetched = harness
        .db
        .get_company(harness.owner_id)
        .await
        .expect("get failed")
        .expect("exists");
    assert_eq!(fetched.name, "Renamed Company");
}
