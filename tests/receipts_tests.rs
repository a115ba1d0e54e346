// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::error::CoreError;
use caderneta::models::{EntryMode, StagingStatus, Status};
use caderneta::receipts::{self, Receipt};
use caderneta::reconcile::{self, TransactionFilter};
use caderneta::{db, store};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> (Connection, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "gil@example.com", "Gil").unwrap().id;
    store::seed_default_categories(&conn, owner).unwrap();
    (conn, owner)
}

fn category(conn: &Connection, owner: i64, nome: &str) -> i64 {
    store::find_category(conn, owner, nome).unwrap().unwrap().id
}

const PHARMACY: &str = r#"{
    "establishment": "Drogaria Central",
    "tax_id": " 12.345.678/0001-90 ",
    "date": "2025-05-10",
    "total": "32.50",
    "items": [
        {"description": "Dipirona", "quantity": "1", "unit_price": "12.50", "line_total": "12.50"},
        {"description": "Shampoo", "quantity": "2", "unit_price": "10.00", "line_total": "20.00"}
    ]
}"#;

const SHOP: &str = r#"{
    "establishment": "Casa Silva",
    "date": "2025-05-11",
    "total": "80.00",
    "items": [
        {"description": "Ração pet", "quantity": "1", "unit_price": "30.00", "line_total": "30.00"},
        {"description": "Netflix gift card", "quantity": "1", "unit_price": "50.00", "line_total": "50.00"}
    ]
}"#;

fn transactions(conn: &Connection, owner: i64) -> usize {
    reconcile::list_transactions(conn, owner, &TransactionFilter::default())
        .unwrap()
        .len()
}

#[test]
fn automatic_ingest_writes_transaction_and_items() {
    let (mut conn, owner) = setup();
    let receipt = Receipt::from_json(PHARMACY).unwrap();
    let ingested = receipts::ingest_automatic(&mut conn, owner, &receipt, None).unwrap();

    let t = &ingested.transaction;
    assert_eq!(t.status, Status::Realized);
    assert_eq!(t.modo_lancamento, EntryMode::Automatic);
    assert_eq!(t.valor, "32.50".parse::<Decimal>().unwrap());
    assert_eq!(t.categoria_id, Some(category(&conn, owner, "Saúde")));
    assert_eq!(t.observacao.as_deref(), Some("CNPJ 12.345.678/0001-90"));
    assert_eq!(ingested.items.len(), 2);
    assert_eq!(ingested.needs_review, 2);
    assert!(ingested.items.iter().all(|i| i.transacao_id == t.id));
}

#[test]
fn parent_category_falls_back_to_item_totals() {
    let (mut conn, owner) = setup();
    let receipt = Receipt::from_json(SHOP).unwrap();
    let ingested = receipts::ingest_automatic(&mut conn, owner, &receipt, None).unwrap();
    let lazer = category(&conn, owner, "Lazer");
    assert_eq!(ingested.transaction.categoria_id, Some(lazer));
    assert_eq!(ingested.items[1].categoria_sugerida_id, Some(lazer));
    assert_eq!(ingested.needs_review, 1);
}

#[test]
fn staged_receipt_is_written_only_on_confirm() {
    let (mut conn, owner) = setup();
    let receipt = Receipt::from_json(SHOP).unwrap();
    let staged = receipts::stage(&conn, owner, &receipt, None).unwrap();
    assert_eq!(staged.suggestions.needs_review, 1);
    assert_eq!(transactions(&conn, owner), 0);

    let pending = receipts::list_staged(&conn, owner, Some(StagingStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].receipt, receipt);

    let outros = category(&conn, owner, "Outros");
    let ingested = receipts::confirm(&mut conn, owner, staged.id, Some(outros)).unwrap();
    assert_eq!(ingested.transaction.modo_lancamento, EntryMode::SemiAutomatic);
    assert_eq!(ingested.transaction.categoria_id, Some(outros));
    assert_eq!(transactions(&conn, owner), 1);

    let processed = receipts::list_staged(&conn, owner, Some(StagingStatus::Processed)).unwrap();
    assert_eq!(processed[0].transacao_id, Some(ingested.transaction.id));

    // confirming or discarding twice is refused
    assert!(matches!(
        receipts::confirm(&mut conn, owner, staged.id, None),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        receipts::discard(&conn, owner, staged.id),
        Err(CoreError::Validation(_))
    ));
    assert_eq!(transactions(&conn, owner), 1);
}

#[test]
fn discarded_receipts_leave_no_trace() {
    let (conn, owner) = setup();
    let receipt = Receipt::from_json(PHARMACY).unwrap();
    let staged = receipts::stage(&conn, owner, &receipt, None).unwrap();
    receipts::discard(&conn, owner, staged.id).unwrap();
    assert!(receipts::list_staged(&conn, owner, Some(StagingStatus::Pending)).unwrap().is_empty());
    assert_eq!(receipts::list_staged(&conn, owner, None).unwrap().len(), 1);
    assert_eq!(transactions(&conn, owner), 0);
}

#[test]
fn bad_payloads_and_references_are_rejected() {
    let (mut conn, owner) = setup();
    assert!(matches!(Receipt::from_json("{not json"), Err(CoreError::Payload(_))));
    let zero = SHOP.replace("\"total\": \"80.00\"", "\"total\": \"0\"");
    assert!(matches!(Receipt::from_json(&zero), Err(CoreError::Validation(_))));

    let receipt = Receipt::from_json(SHOP).unwrap();
    assert!(matches!(
        receipts::ingest_automatic(&mut conn, owner, &receipt, Some(404)),
        Err(CoreError::NotFound { entity: "account", .. })
    ));
    assert!(matches!(
        receipts::confirm(&mut conn, owner, 9, None),
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(transactions(&conn, owner), 0);
}

#[test]
fn confirm_rolls_back_when_the_staged_row_changes_underneath() {
    let (mut conn, owner) = setup();
    let receipt = Receipt::from_json(PHARMACY).unwrap();
    let staged = receipts::stage(&conn, owner, &receipt, None).unwrap();
    // another writer discards the receipt between the load and the mark
    conn.execute_batch(
        "CREATE TRIGGER concurrent_discard AFTER INSERT ON transacoes
         BEGIN UPDATE recibos_pendentes SET status='descartado'; END;",
    )
    .unwrap();

    let err = receipts::confirm(&mut conn, owner, staged.id, None).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(transactions(&conn, owner), 0);
    let pending = receipts::list_staged(&conn, owner, Some(StagingStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transacao_id, None);
}

#[test]
fn staged_receipts_of_another_user_are_untouchable() {
    let (mut conn, owner) = setup();
    let other = store::create_user(&conn, "outra@example.com", "Outra").unwrap().id;
    let staged = receipts::stage(&conn, owner, &Receipt::from_json(SHOP).unwrap(), None).unwrap();
    assert!(matches!(
        receipts::confirm(&mut conn, other, staged.id, None),
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        receipts::discard(&conn, other, staged.id),
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(receipts::list_staged(&conn, owner, Some(StagingStatus::Pending)).unwrap().len(), 1);
}
