// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::aggregate;
use crate::models::Kind;
use crate::utils::{arg, fmt_money, get_currency, maybe_print_json, opt_arg, parse_period, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("totals", sub)) => totals(conn, owner, sub)?,
        Some(("by-category", sub)) => by_category(conn, owner, sub)?,
        _ => {}
    }
    Ok(())
}

fn totals(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let period = parse_period(arg(sub, "month")?)?;
    let t = aggregate::period_totals(conn, owner, period)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &t)? {
        let ccy = get_currency(conn)?;
        let data = vec![
            vec!["Income".into(), fmt_money(&t.receitas, &ccy), fmt_money(&t.receitas_previstas, &ccy)],
            vec!["Expenses".into(), fmt_money(&t.despesas, &ccy), fmt_money(&t.despesas_previstas, &ccy)],
            vec!["Balance".into(), fmt_money(&t.saldo, &ccy), String::new()],
        ];
        println!("{}", period);
        println!("{}", pretty_table(&["", "Realized", "Still projected"], data));
    }
    Ok(())
}

fn by_category(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let period = parse_period(arg(sub, "month")?)?;
    let kind = opt_arg(sub, "kind").map(str::parse::<Kind>).transpose()?;
    let rows: Vec<_> = aggregate::category_summary(conn, owner, period)?
        .into_iter()
        .filter(|r| kind.is_none_or(|k| k == r.tipo))
        .collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        let ccy = get_currency(conn)?;
        let data = rows
            .iter()
            .map(|r| {
                vec![
                    r.categoria.clone(),
                    r.tipo.to_string(),
                    fmt_money(&r.total, &ccy),
                    r.quantidade.to_string(),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Category", "Kind", "Total", "Count"], data));
    }
    Ok(())
}
