// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use caderneta::suggest::{self, CategoryMatcher};
use caderneta::{cli, commands::rules, db, store};
use rusqlite::Connection;

fn setup() -> (Connection, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = store::create_user(&conn, "lia@example.com", "Lia").unwrap().id;
    store::seed_default_categories(&conn, owner).unwrap();
    (conn, owner)
}

fn run(conn: &Connection, owner: i64, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["caderneta", "rules"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("rules", rules_m)) => rules::handle(conn, owner, rules_m),
        _ => panic!("no rules subcommand"),
    }
}

#[test]
fn rules_add_rejects_invalid_regex() {
    let (conn, owner) = setup();
    let err = run(&conn, owner, &["add", "--pattern", "(unclosed", "--category", "Moradia"]).unwrap_err();
    assert!(err.to_string().contains("Invalid regex pattern"));
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM regras", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn rules_feed_category_suggestions() {
    let (conn, owner) = setup();
    let moradia = store::find_category(&conn, owner, "Moradia").unwrap().unwrap().id;
    assert_eq!(suggest::for_owner(&conn, owner).unwrap().suggest("PIX JOAO IMOVEIS"), None);

    run(&conn, owner, &["add", "--pattern", "(?i)^pix joao", "--category", "Moradia"]).unwrap();
    let chain = suggest::for_owner(&conn, owner).unwrap();
    assert_eq!(chain.suggest("PIX JOAO IMOVEIS"), Some(moradia));
}

#[test]
fn rules_on_inactive_categories_are_ignored() {
    let (conn, owner) = setup();
    let moradia = store::find_category(&conn, owner, "Moradia").unwrap().unwrap().id;
    run(&conn, owner, &["add", "--pattern", "condominio bloco", "--category", "Moradia"]).unwrap();
    store::deactivate_category(&conn, owner, moradia).unwrap();
    let chain = suggest::for_owner(&conn, owner).unwrap();
    assert_eq!(chain.suggest("condominio bloco b"), None);
}

#[test]
fn rules_rm_unknown_id_fails() {
    let (conn, owner) = setup();
    assert!(run(&conn, owner, &["rm", "--id", "42"]).is_err());
}
