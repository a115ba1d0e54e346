// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::error::CoreError;
use caderneta::selic::{self, SelicRate};
use caderneta::{cli, commands, db, ledger, store};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn setup() -> (Connection, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "caio@example.com", "Caio").unwrap().id;
    (conn, owner)
}

fn invest(conn: &Connection, owner: i64, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["caderneta", "invest"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("invest", m)) => commands::investments::handle(conn, owner, m),
        _ => panic!("no invest subcommand"),
    }
}

#[test]
fn the_latest_published_rate_wins() {
    let (conn, _) = setup();
    assert!(selic::latest_rate(&conn).unwrap().is_none());

    selic::save_rate(&conn, &SelicRate { data: date(2025, 6, 18), valor_aa: dec("15.00") }).unwrap();
    selic::save_rate(&conn, &SelicRate { data: date(2025, 3, 19), valor_aa: dec("14.25") }).unwrap();
    assert_eq!(selic::latest_rate(&conn).unwrap().unwrap().valor_aa, dec("15.00"));

    // a second fetch of the same date replaces the value
    selic::save_rate(&conn, &SelicRate { data: date(2025, 6, 18), valor_aa: dec("14.90") }).unwrap();
    let latest = selic::latest_rate(&conn).unwrap().unwrap();
    assert_eq!(latest, SelicRate { data: date(2025, 6, 18), valor_aa: dec("14.90") });

    let negative = selic::save_rate(&conn, &SelicRate { data: date(2025, 7, 1), valor_aa: dec("-1") });
    assert!(matches!(negative, Err(CoreError::Validation(_))));
}

#[test]
fn estimates_start_from_the_believed_balance() {
    let (conn, owner) = setup();
    let cdb = ledger::create_investment(&conn, owner, "CDB Inter").unwrap().id;
    ledger::record_balance(&conn, owner, cdb, date(2025, 1, 31), dec("1000"), None).unwrap();

    let missing_rate = selic::estimate_investment(&conn, owner, cdb, date(2025, 2, 1), 365, dec("100"), None);
    assert!(matches!(missing_rate, Err(CoreError::Validation(_))));

    selic::save_rate(&conn, &SelicRate { data: date(2025, 1, 29), valor_aa: dec("10") }).unwrap();
    let e = selic::estimate_investment(&conn, owner, cdb, date(2025, 2, 1), 365, dec("100"), None).unwrap();
    assert_eq!(e.principal, dec("1000"));
    assert_eq!(e.selic_aa, dec("10"));
    assert_eq!(e.value, dec("1100.00"));

    let explicit = selic::estimate_investment(&conn, owner, cdb, date(2025, 2, 1), 365, dec("50"), Some(dec("20"))).unwrap();
    assert_eq!(explicit.value, dec("1100.00"));

    let before_any_balance =
        selic::estimate_investment(&conn, owner, cdb, date(2025, 1, 1), 30, dec("100"), None);
    assert!(matches!(before_any_balance, Err(CoreError::Validation(_))));
}

#[test]
fn selic_commands_work_offline() {
    let (conn, owner) = setup();
    invest(&conn, owner, &["selic", "show"]).unwrap();
    invest(&conn, owner, &["selic", "set", "--rate", "10.5", "--date", "2025-05-07"]).unwrap();
    assert_eq!(selic::latest_rate(&conn).unwrap().unwrap().valor_aa, dec("10.5"));

    invest(&conn, owner, &["selic", "estimate", "--days", "30", "--principal", "5000"]).unwrap();
    invest(
        &conn,
        owner,
        &["selic", "estimate", "--days", "90", "--principal", "5000", "--percent", "110", "--rate", "12"],
    )
    .unwrap();

    invest(&conn, owner, &["add", "--name", "Tesouro Selic"]).unwrap();
    invest(&conn, owner, &["record", "--name", "Tesouro Selic", "--date", "2025-05-01", "--balance", "2000"]).unwrap();
    invest(
        &conn,
        owner,
        &["selic", "estimate", "--days", "30", "--name", "Tesouro Selic", "--on", "2025-05-10"],
    )
    .unwrap();

    assert!(invest(&conn, owner, &["selic", "estimate", "--days", "thirty", "--principal", "1"]).is_err());
    assert!(invest(&conn, owner, &["selic", "estimate", "--days", "30"]).is_err());
}
