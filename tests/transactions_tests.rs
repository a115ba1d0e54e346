// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::error::CoreError;
use caderneta::models::{AccountKind, EntryMode, Kind, Status};
use caderneta::reconcile::{self, TransactionFilter};
use caderneta::store::{self, NewAccount};
use caderneta::{cards, cli, commands, db};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> (Connection, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "nina@example.com", "Nina").unwrap().id;
    store::seed_default_categories(&conn, owner).unwrap();
    store::create_account(
        &conn,
        owner,
        NewAccount {
            nome: "Nubank".into(),
            tipo: AccountKind::CreditCard,
            saldo_inicial: Decimal::ZERO,
            data_saldo_inicial: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            dia_fechamento: Some(10),
            dia_vencimento: Some(20),
        },
    )
    .unwrap();
    (conn, owner)
}

fn tx(conn: &mut Connection, owner: i64, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["caderneta", "tx"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("tx", tx_m)) => commands::transactions::handle(conn, owner, tx_m),
        _ => panic!("no tx subcommand"),
    }
}

fn recurring(conn: &Connection, owner: i64, args: &[&str]) {
    let mut argv = vec!["caderneta", "recurring"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("recurring", m)) => commands::recurring::handle(conn, owner, m).unwrap(),
        _ => panic!("no recurring subcommand"),
    }
}

fn project(conn: &Connection, owner: i64, month: &str) {
    let matches = cli::build_cli().get_matches_from(["caderneta", "project", "--month", month]);
    match matches.subcommand() {
        Some(("project", m)) => commands::recurring::project(conn, owner, m).unwrap(),
        _ => panic!("no project subcommand"),
    }
}

fn all(conn: &Connection, owner: i64) -> Vec<caderneta::models::Transaction> {
    reconcile::list_transactions(conn, owner, &TransactionFilter::default()).unwrap()
}

#[test]
fn add_suggests_category_for_expenses() {
    let (mut conn, owner) = setup();
    tx(
        &mut conn,
        owner,
        &[
            "add", "--date", "2025-03-04", "--description", "Posto Shell", "--amount", "210.50",
            "--kind", "despesa", "--account", "Nubank",
        ],
    )
    .unwrap();
    let t = &all(&conn, owner)[0];
    let transporte = store::find_category(&conn, owner, "Transporte").unwrap().unwrap().id;
    assert_eq!(t.categoria_id, Some(transporte));
    assert_eq!(t.modo_lancamento, EntryMode::Manual);
    assert_eq!(t.valor, "210.50".parse::<Decimal>().unwrap());
}

#[test]
fn add_with_template_reconciles_and_rm_undoes_it() {
    let (mut conn, owner) = setup();
    recurring(
        &conn,
        owner,
        &[
            "add", "--description", "Academia", "--amount", "99.90", "--kind", "despesa", "--day",
            "31", "--category", "Saúde",
        ],
    );
    project(&conn, owner, "2025-02");
    let projected = all(&conn, owner)[0].clone();
    assert_eq!(projected.data, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    let tpl = projected.recorrente_id.unwrap().to_string();

    tx(
        &mut conn,
        owner,
        &[
            "add", "--date", "2025-02-27", "--description", "Academia", "--amount", "99.90",
            "--kind", "despesa", "--template", &tpl,
        ],
    )
    .unwrap();
    let rows = all(&conn, owner);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|t| t.status == Status::Replaced).count(), 1);
    let realized = rows.iter().find(|t| t.status == Status::Realized).unwrap().clone();
    assert_eq!(realized.transacao_prevista_id, Some(projected.id));

    tx(&mut conn, owner, &["rm", "--id", &realized.id.to_string()]).unwrap();
    let rows = all(&conn, owner);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, Status::Projected);
}

#[test]
fn realize_and_edit_through_the_cli() {
    let (mut conn, owner) = setup();
    recurring(
        &conn,
        owner,
        &[
            "add", "--description", "Salário", "--amount", "5000", "--kind", "receita", "--day", "5",
            "--category", "Salário",
        ],
    );
    project(&conn, owner, "2025-03");
    let projected = all(&conn, owner)[0].id.to_string();
    tx(&mut conn, owner, &["realize", "--id", &projected, "--amount", "5100"]).unwrap();

    let realized = all(&conn, owner)
        .into_iter()
        .find(|t| t.status == Status::Realized)
        .unwrap();
    assert_eq!(realized.valor, Decimal::from(5100));
    assert_eq!(realized.tipo, Kind::Income);

    tx(
        &mut conn,
        owner,
        &["edit", "--id", &realized.id.to_string(), "--clear-category", "--note", "com bônus"],
    )
    .unwrap();
    let edited = reconcile::get_transaction(&conn, owner, realized.id).unwrap().unwrap();
    assert_eq!(edited.categoria_id, None);
    assert_eq!(edited.observacao.as_deref(), Some("com bônus"));

    // the replaced projection is frozen
    assert!(tx(&mut conn, owner, &["edit", "--id", &projected, "--amount", "1"]).is_err());
}

#[test]
fn invalid_amounts_and_dates_are_rejected() {
    let (mut conn, owner) = setup();
    let base = ["add", "--description", "X", "--kind", "despesa"];
    let mut bad_amount = base.to_vec();
    bad_amount.extend(["--date", "2025-03-01", "--amount", "0"]);
    assert!(tx(&mut conn, owner, &bad_amount).is_err());
    let mut bad_date = base.to_vec();
    bad_date.extend(["--date", "2025-02-30", "--amount", "3"]);
    assert!(tx(&mut conn, owner, &bad_date).is_err());
    assert!(all(&conn, owner).is_empty());
}

#[test]
fn card_statement_sums_the_current_cycle() {
    let (mut conn, owner) = setup();
    for (date, amount) in [("2025-02-10", "50"), ("2025-02-11", "30"), ("2025-03-10", "20"), ("2025-03-11", "99")] {
        tx(
            &mut conn,
            owner,
            &[
                "add", "--date", date, "--description", "Compra", "--amount", amount, "--kind",
                "despesa", "--account", "Nubank", "--category", "Outros",
            ],
        )
        .unwrap_or_else(|_| panic!("add {}", date));
    }
    let card = store::find_account(&conn, owner, "Nubank").unwrap().unwrap().id;
    let st = cards::statement(&conn, owner, card, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()).unwrap();
    assert_eq!(st.transactions, 2);
    assert_eq!(st.total, Decimal::from(50));
    assert_eq!(st.cycle.due, NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
}

#[test]
fn card_statement_reports_a_corrupt_stored_amount() {
    let (mut conn, owner) = setup();
    tx(
        &mut conn,
        owner,
        &[
            "add", "--date", "2025-02-12", "--description", "Compra", "--amount", "10", "--kind",
            "despesa", "--account", "Nubank",
        ],
    )
    .unwrap();
    conn.execute("UPDATE transacoes SET valor='dez reais'", []).unwrap();
    let card = store::find_account(&conn, owner, "Nubank").unwrap().unwrap().id;
    let err = cards::statement(&conn, owner, card, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()).unwrap_err();
    assert!(matches!(err, CoreError::Storage { ref context, .. } if context == "transacoes.valor"));
}

#[test]
fn doctor_reports_stale_projections() {
    let (conn, owner) = setup();
    recurring(
        &conn,
        owner,
        &[
            "add", "--description", "Internet", "--amount", "120", "--kind", "despesa", "--day", "12",
        ],
    );
    project(&conn, owner, "2025-01");
    let rows = commands::doctor::diagnose(&conn, owner, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "stale_projection");
    assert!(commands::doctor::diagnose(&conn, owner, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
        .unwrap()
        .is_empty());
}

#[test]
fn account_balance_counts_only_realized_rows() {
    let (mut conn, owner) = setup();
    let card = store::find_account(&conn, owner, "Nubank").unwrap().unwrap().id;
    recurring(
        &conn,
        owner,
        &[
            "add", "--description", "Seguro", "--amount", "80", "--kind", "despesa", "--day", "2",
            "--account", "Nubank",
        ],
    );
    project(&conn, owner, "2025-04");
    for (kind, amount) in [("despesa", "120"), ("receita", "20")] {
        tx(
            &mut conn,
            owner,
            &[
                "add", "--date", "2025-04-03", "--description", "Estorno parcial", "--amount",
                amount, "--kind", kind, "--account", "Nubank",
            ],
        )
        .unwrap();
    }
    let on = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
    assert_eq!(store::account_balance(&conn, owner, card, on).unwrap(), Decimal::from(-100));
    let before = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    assert_eq!(store::account_balance(&conn, owner, card, before).unwrap(), Decimal::ZERO);
}
