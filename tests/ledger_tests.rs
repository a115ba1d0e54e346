// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::error::CoreError;
use caderneta::ledger::{self, AsOf};
use caderneta::models::Period;
use caderneta::{db, store};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    day(y, m, d).and_hms_opt(9, 0, 0).unwrap()
}

fn setup() -> (Connection, i64, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "duda@example.com", "Duda").unwrap().id;
    let cdb = ledger::create_investment(&conn, owner, "CDB").unwrap().id;
    (conn, owner, cdb)
}

#[test]
fn corrections_do_not_rewrite_the_past() {
    let (conn, owner, cdb) = setup();
    let reference = day(2025, 1, 31);
    ledger::record_balance(&conn, owner, cdb, reference, Decimal::from(1000), Some(at(2025, 2, 1))).unwrap();
    ledger::record_balance(&conn, owner, cdb, reference, Decimal::from(1050), Some(at(2025, 3, 1))).unwrap();

    let then = ledger::belief(&conn, owner, cdb, reference, AsOf::At(at(2025, 2, 15))).unwrap().unwrap();
    assert_eq!(then.saldo, Decimal::from(1000));
    let later = ledger::belief(&conn, owner, cdb, reference, AsOf::At(at(2025, 3, 15))).unwrap().unwrap();
    assert_eq!(later.saldo, Decimal::from(1050));
    let current = ledger::belief(&conn, owner, cdb, reference, AsOf::Now).unwrap().unwrap();
    assert_eq!(current.saldo, Decimal::from(1050));

    // nothing was known yet
    assert!(ledger::belief(&conn, owner, cdb, reference, AsOf::At(at(2025, 1, 31))).unwrap().is_none());

    let history = ledger::history(&conn, owner, cdb, reference).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].saldo, Decimal::from(1000));
}

#[test]
fn same_knowledge_instant_conflicts() {
    let (conn, owner, cdb) = setup();
    let reference = day(2025, 1, 31);
    ledger::record_balance(&conn, owner, cdb, reference, Decimal::from(10), Some(at(2025, 2, 1))).unwrap();
    let err = ledger::record_balance(&conn, owner, cdb, reference, Decimal::from(11), Some(at(2025, 2, 1))).unwrap_err();
    assert!(matches!(err, CoreError::ConflictingKnowledge { investment_id, .. } if investment_id == cdb));
    assert_eq!(ledger::history(&conn, owner, cdb, reference).unwrap().len(), 1);
}

#[test]
fn rejects_negative_balances_and_unknown_investments() {
    let (conn, owner, cdb) = setup();
    let err = ledger::record_balance(&conn, owner, cdb, day(2025, 1, 31), Decimal::from(-1), None).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = ledger::record_balance(&conn, owner, 999, day(2025, 1, 31), Decimal::ONE, None).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "investment", .. }));
    // zero is a valid balance
    ledger::record_balance(&conn, owner, cdb, day(2025, 1, 31), Decimal::ZERO, None).unwrap();
}

#[test]
fn series_skips_dates_without_beliefs() {
    let (conn, owner, cdb) = setup();
    for (m, v) in [(1, 100), (3, 130)] {
        let reference = Period::new(2025, m).unwrap().last_day();
        ledger::record_balance(&conn, owner, cdb, reference, Decimal::from(v), Some(at(2025, 6, 1))).unwrap();
    }
    let points = ledger::series(&conn, owner, cdb, day(2025, 1, 1), day(2025, 3, 31), AsOf::Now).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].data_referencia, day(2025, 3, 31));

    // before the knowledge date nothing is visible
    let early = ledger::series(&conn, owner, cdb, day(2025, 1, 1), day(2025, 3, 31), AsOf::At(at(2025, 5, 1))).unwrap();
    assert!(early.is_empty());

    assert!(ledger::series(&conn, owner, cdb, day(2025, 3, 1), day(2025, 1, 1), AsOf::Now).is_err());
}

#[test]
fn chart_carries_last_value_forward() {
    let (conn, owner, cdb) = setup();
    ledger::record_balance(&conn, owner, cdb, day(2025, 1, 31), Decimal::from(100), Some(at(2025, 2, 1))).unwrap();
    ledger::record_balance(&conn, owner, cdb, day(2025, 3, 31), Decimal::from(130), Some(at(2025, 4, 1))).unwrap();

    let start = Period::new(2024, 12).unwrap();
    let chart = ledger::monthly_chart(&conn, owner, cdb, start, 5, AsOf::Now).unwrap();
    let values: Vec<Option<Decimal>> = chart.iter().map(|p| p.value).collect();
    assert_eq!(
        values,
        vec![
            None,
            Some(Decimal::from(100)),
            Some(Decimal::from(100)),
            Some(Decimal::from(130)),
            Some(Decimal::from(130)),
        ]
    );
    assert_eq!(chart[2].date, day(2025, 2, 28));
}

#[test]
fn totals_sum_last_known_values() {
    let (conn, owner, cdb) = setup();
    let tesouro = ledger::create_investment(&conn, owner, "Tesouro").unwrap().id;
    ledger::record_balance(&conn, owner, cdb, day(2025, 1, 31), Decimal::from(100), Some(at(2025, 2, 1))).unwrap();
    ledger::record_balance(&conn, owner, tesouro, day(2025, 2, 28), Decimal::from(50), Some(at(2025, 3, 1))).unwrap();

    assert_eq!(ledger::total_on(&conn, owner, day(2025, 2, 15), AsOf::Now).unwrap(), Decimal::from(100));
    assert_eq!(ledger::total_on(&conn, owner, day(2025, 3, 1), AsOf::Now).unwrap(), Decimal::from(150));

    ledger::deactivate_investment(&conn, owner, tesouro).unwrap();
    assert_eq!(ledger::total_on(&conn, owner, day(2025, 3, 1), AsOf::Now).unwrap(), Decimal::from(100));
}

#[test]
fn investment_names_are_unique_per_owner() {
    let (conn, owner, _) = setup();
    assert!(ledger::create_investment(&conn, owner, "CDB").is_err());
    let other = store::create_user(&conn, "eva@example.com", "Eva").unwrap().id;
    ledger::create_investment(&conn, other, "CDB").unwrap();
    assert!(ledger::value_on(&conn, other, 1, day(2025, 1, 1), AsOf::Now).unwrap().is_none());
}

#[test]
fn chart_refuses_unbounded_month_counts() {
    let (conn, owner, cdb) = setup();
    let start = Period::new(2025, 1).unwrap();
    assert!(matches!(
        ledger::monthly_chart(&conn, owner, cdb, start, u32::MAX, AsOf::Now),
        Err(CoreError::Validation(_))
    ));
    assert!(ledger::monthly_chart(&conn, owner, cdb, start, 0, AsOf::Now).unwrap().is_empty());
}
