// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::models::{Kind, Period};
use caderneta::reconcile::{self, NewTransaction};
use caderneta::store::{self, NewTemplate};
use caderneta::{cli, commands::exporter, db, projection};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::tempdir;

fn setup() -> (Connection, i64) {
    let mut conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "jo@example.com", "Jo").unwrap().id;
    let lazer = store::create_category(&conn, owner, "Lazer", Kind::Expense, None)
        .unwrap()
        .id;
    let tpl = store::create_template(
        &conn,
        owner,
        NewTemplate {
            conta_id: None,
            categoria_id: Some(lazer),
            descricao: "Streaming".into(),
            valor: "39.90".parse().unwrap(),
            tipo: Kind::Expense,
            dia_do_mes: 15,
        },
    )
    .unwrap()
    .id;
    projection::project_period(&conn, owner, Period::new(2025, 6).unwrap()).unwrap();
    let mut new = NewTransaction::manual(
        "Streaming",
        "39.90".parse().unwrap(),
        Kind::Expense,
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
    );
    new.categoria_id = Some(lazer);
    new.recorrente_id = Some(tpl);
    reconcile::record(&mut conn, owner, new).unwrap();
    reconcile::record(
        &mut conn,
        owner,
        NewTransaction::manual(
            "Presente",
            Decimal::from(100),
            Kind::Income,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        ),
    )
    .unwrap();
    (conn, owner)
}

fn run(conn: &Connection, owner: i64, args: &[&str]) {
    let mut argv = vec!["caderneta", "export", "transactions"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(conn, owner, export_m).unwrap();
    } else {
        panic!("no export subcommand");
    }
}

#[test]
fn csv_export_keeps_status_and_links() {
    let (conn, owner) = setup();
    let dir = tempdir().unwrap();
    let out = dir.path().join("june.csv");
    run(&conn, owner, &["--out", out.to_str().unwrap(), "--month", "2025-06"]);

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(&headers[5], "status");
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][5], "substituida");
    assert_eq!(&rows[1][5], "realizada");
    assert_eq!(&rows[1][7], "Lazer");
    assert_eq!(&rows[1][10], &rows[0][0]);
}

#[test]
fn json_export_covers_every_month_without_filter() {
    let (conn, owner) = setup();
    let dir = tempdir().unwrap();
    let out = dir.path().join("all.json");
    run(&conn, owner, &["--format", "json", "--out", out.to_str().unwrap()]);

    let raw = std::fs::read_to_string(&out).unwrap();
    let items: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2]["kind"], "receita");
    assert_eq!(items[2]["amount"], "100");
    assert!(items[2]["category"].is_null());
}
