// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::error::{CoreError, Warning};
use caderneta::models::{Kind, Period, Status};
use caderneta::reconcile::{self, NewTransaction, Realization, TransactionFilter, TransactionPatch};
use caderneta::store::{self, NewTemplate};
use caderneta::{aggregate, db, projection};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

struct Fixture {
    conn: Connection,
    owner: i64,
    food: i64,
    template: i64,
}

fn setup() -> Fixture {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "caio@example.com", "Caio").unwrap().id;
    let food = store::create_category(&conn, owner, "Food", Kind::Expense, None)
        .unwrap()
        .id;
    let template = store::create_template(
        &conn,
        owner,
        NewTemplate {
            conta_id: None,
            categoria_id: Some(food),
            descricao: "Feira".into(),
            valor: Decimal::from(150),
            tipo: Kind::Expense,
            dia_do_mes: 10,
        },
    )
    .unwrap()
    .id;
    Fixture {
        conn,
        owner,
        food,
        template,
    }
}

fn march() -> Period {
    Period::new(2025, 3).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn real(food: i64, template: i64, amount: i64, day: u32) -> NewTransaction {
    let mut new = NewTransaction::manual("Feira do bairro", Decimal::from(amount), Kind::Expense, date(day));
    new.categoria_id = Some(food);
    new.recorrente_id = Some(template);
    new
}

fn status_of(conn: &Connection, owner: i64, id: i64) -> Status {
    reconcile::get_transaction(conn, owner, id).unwrap().unwrap().status
}

#[test]
fn realized_entry_replaces_projection() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();

    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 162, 12)).unwrap();
    assert_eq!(recorded.replaced, Some(projected.id));
    assert_eq!(recorded.transaction.status, Status::Realized);
    assert_eq!(recorded.transaction.transacao_prevista_id, Some(projected.id));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Replaced);
    assert!(reconcile::check_links(&f.conn, f.owner).unwrap().is_empty());

    // the replaced projection never counts
    let rollup = aggregate::rollup(&f.conn, f.owner, f.food, march()).unwrap();
    assert_eq!(rollup.realized, Decimal::from(162));
    assert_eq!(rollup.projected, Decimal::ZERO);
    assert_eq!(rollup.consumed(), Decimal::from(162));
}

#[test]
fn entry_in_another_month_does_not_match() {
    let mut f = setup();
    projection::project_period(&f.conn, f.owner, march()).unwrap();
    let mut new = real(f.food, f.template, 150, 1);
    new.data = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
    let recorded = reconcile::record(&mut f.conn, f.owner, new).unwrap();
    assert_eq!(recorded.replaced, None);
    assert_eq!(recorded.transaction.transacao_prevista_id, None);
}

#[test]
fn without_outstanding_projection_entry_is_plain() {
    let mut f = setup();
    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();
    assert_eq!(recorded.replaced, None);
    // a later projection pass sees the month as covered
    let report = projection::project_period(&f.conn, f.owner, march()).unwrap();
    assert_eq!(report.skipped, 1);
}

#[test]
fn deleting_the_replacement_restores_the_projection() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 170, 11)).unwrap();

    let deleted = reconcile::delete_transaction(&mut f.conn, f.owner, recorded.transaction.id).unwrap();
    assert_eq!(deleted.restored, Some(projected.id));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Projected);

    let rollup = aggregate::rollup(&f.conn, f.owner, f.food, march()).unwrap();
    assert_eq!(rollup.realized, Decimal::ZERO);
    assert_eq!(rollup.projected, Decimal::from(150));
}

#[test]
fn referenced_projection_cannot_be_deleted() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();
    let err = reconcile::delete_transaction(&mut f.conn, f.owner, projected.id).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn realize_carries_fields_with_overrides() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    let recorded = reconcile::realize_projection(
        &mut f.conn,
        f.owner,
        projected.id,
        Realization {
            valor: Some(Decimal::from(149)),
            ..Default::default()
        },
    )
    .unwrap();
    let t = recorded.transaction;
    assert_eq!(t.valor, Decimal::from(149));
    assert_eq!(t.data, date(10));
    assert_eq!(t.categoria_id, Some(f.food));
    assert_eq!(t.recorrente_id, Some(f.template));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Replaced);

    // already replaced
    let again = reconcile::realize_projection(&mut f.conn, f.owner, projected.id, Realization::default());
    assert!(matches!(again, Err(CoreError::Validation(_))));
}

#[test]
fn missing_references_become_warnings() {
    let mut f = setup();
    let mut new = NewTransaction::manual("Padaria", Decimal::from(12), Kind::Expense, date(3));
    new.categoria_id = Some(9999);
    new.conta_id = Some(4242);
    let recorded = reconcile::record(&mut f.conn, f.owner, new).unwrap();
    assert_eq!(recorded.transaction.categoria_id, None);
    assert_eq!(recorded.transaction.conta_id, None);
    assert_eq!(
        recorded.warnings,
        vec![
            Warning::ReferentialGap { entity: "account", id: 4242 },
            Warning::ReferentialGap { entity: "category", id: 9999 },
        ]
    );
}

#[test]
fn invalid_amount_is_rejected_before_writing() {
    let mut f = setup();
    let new = NewTransaction::manual("Nada", Decimal::ZERO, Kind::Expense, date(3));
    assert!(matches!(
        reconcile::record(&mut f.conn, f.owner, new),
        Err(CoreError::Validation(_))
    ));
    let all = reconcile::list_transactions(&f.conn, f.owner, &TransactionFilter::default()).unwrap();
    assert!(all.is_empty());
}

#[test]
fn editing_keeps_links_and_refuses_replaced_rows() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();

    let updated = reconcile::update_transaction(
        &f.conn,
        f.owner,
        recorded.transaction.id,
        TransactionPatch {
            valor: Some(Decimal::from(155)),
            categoria_id: Some(None),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.transaction.valor, Decimal::from(155));
    assert_eq!(updated.transaction.categoria_id, None);
    assert_eq!(updated.transaction.transacao_prevista_id, Some(projected.id));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Replaced);

    let err = reconcile::update_transaction(&f.conn, f.owner, projected.id, TransactionPatch::default());
    assert!(matches!(err, Err(CoreError::Validation(_))));
}

#[test]
fn filters_by_status() {
    let mut f = setup();
    projection::project_period(&f.conn, f.owner, march()).unwrap();
    reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();
    let filter = TransactionFilter {
        period: Some(march()),
        status: Some(Status::Replaced),
        ..Default::default()
    };
    assert_eq!(reconcile::list_transactions(&f.conn, f.owner, &filter).unwrap().len(), 1);
}

#[test]
fn realize_refuses_a_date_outside_the_projection_month() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    let err = reconcile::realize_projection(
        &mut f.conn,
        f.owner,
        projected.id,
        Realization {
            data: NaiveDate::from_ymd_opt(2025, 4, 2),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Projected);

    // last day of the same month is fine
    let ok = reconcile::realize_projection(
        &mut f.conn,
        f.owner,
        projected.id,
        Realization {
            data: Some(date(31)),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ok.transaction.data, date(31));
}

#[test]
fn date_edits_keep_linked_rows_in_their_month() {
    let mut f = setup();
    projection::project_period(&f.conn, f.owner, march()).unwrap();
    let april = projection::project_period(&f.conn, f.owner, march().next()).unwrap().created[0].clone();
    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();
    let moved = |d: NaiveDate| TransactionPatch {
        data: Some(d),
        ..Default::default()
    };

    let err = reconcile::update_transaction(
        &f.conn,
        f.owner,
        recorded.transaction.id,
        moved(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = reconcile::update_transaction(&f.conn, f.owner, april.id, moved(date(20))).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let within = reconcile::update_transaction(&f.conn, f.owner, recorded.transaction.id, moved(date(25))).unwrap();
    assert_eq!(within.transaction.data, date(25));

    // unlinked rows move freely
    let plain = reconcile::record(
        &mut f.conn,
        f.owner,
        NewTransaction::manual("Padaria", Decimal::from(9), Kind::Expense, date(3)),
    )
    .unwrap();
    let later = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
    let edited = reconcile::update_transaction(&f.conn, f.owner, plain.transaction.id, moved(later)).unwrap();
    assert_eq!(edited.transaction.data, later);
    assert!(reconcile::check_links(&f.conn, f.owner).unwrap().is_empty());
}

#[test]
fn check_links_reports_a_replacement_dated_in_another_month() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    let recorded = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap();
    f.conn
        .execute(
            "UPDATE transacoes SET data='2025-04-03' WHERE id=?1",
            [recorded.transaction.id],
        )
        .unwrap();
    let issues = reconcile::check_links(&f.conn, f.owner).unwrap();
    assert_eq!(
        issues,
        vec![reconcile::LinkIssue::PeriodMismatch {
            realized: recorded.transaction.id,
            projected: projected.id,
            realized_on: NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
            projected_period: march(),
        }]
    );
}

#[test]
fn failed_replacement_insert_rolls_back_the_retirement() {
    let mut f = setup();
    let projected = projection::project_period(&f.conn, f.owner, march()).unwrap().created[0].clone();
    f.conn
        .execute_batch(
            "CREATE TRIGGER block_replacements BEFORE INSERT ON transacoes
             WHEN NEW.transacao_prevista_id IS NOT NULL
             BEGIN SELECT RAISE(ABORT, 'replacement blocked'); END;",
        )
        .unwrap();

    let err = reconcile::record(&mut f.conn, f.owner, real(f.food, f.template, 150, 10)).unwrap_err();
    assert!(matches!(err, CoreError::ReconciliationAtomicity(_)));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Projected);

    let err = reconcile::realize_projection(&mut f.conn, f.owner, projected.id, Realization::default()).unwrap_err();
    assert!(matches!(err, CoreError::ReconciliationAtomicity(_)));
    assert_eq!(status_of(&f.conn, f.owner, projected.id), Status::Projected);

    let realized = TransactionFilter {
        status: Some(Status::Realized),
        ..Default::default()
    };
    assert!(reconcile::list_transactions(&f.conn, f.owner, &realized).unwrap().is_empty());
}
