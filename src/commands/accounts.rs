// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::AccountKind;
use crate::store::{self, NewAccount};
use crate::utils::{
    arg, fmt_money, get_currency, id_for_account, maybe_print_json, opt_arg, parse_date,
    parse_decimal, pretty_table,
};
use crate::cards;
use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;

fn parse_day(raw: Option<&str>, what: &str) -> Result<Option<u32>> {
    raw.map(|s| s.parse::<u32>().with_context(|| format!("Invalid {} '{}'", what, s)))
        .transpose()
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let tipo: AccountKind = arg(sub, "kind")?.parse()?;
            let opening_date = match opt_arg(sub, "opening_date") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let account = store::create_account(
                conn,
                owner,
                NewAccount {
                    nome: arg(sub, "name")?.to_string(),
                    tipo,
                    saldo_inicial: parse_decimal(arg(sub, "opening")?)?,
                    data_saldo_inicial: opening_date,
                    dia_fechamento: parse_day(opt_arg(sub, "closing_day"), "closing day")?,
                    dia_vencimento: parse_day(opt_arg(sub, "due_day"), "due day")?,
                },
            )?;
            println!("Added account '{}' ({})", account.nome, account.tipo);
        }
        Some(("list", sub)) => {
            let accounts = store::list_accounts(conn, owner, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &accounts)? {
                let data = accounts
                    .iter()
                    .map(|a| {
                        vec![
                            a.id.to_string(),
                            a.nome.clone(),
                            a.tipo.to_string(),
                            a.saldo_inicial.to_string(),
                            a.data_saldo_inicial.to_string(),
                            match (a.dia_fechamento, a.dia_vencimento) {
                                (Some(c), Some(d)) => format!("closes {} / due {}", c, d),
                                _ => String::new(),
                            },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Kind", "Opening", "Since", "Card"], data)
                );
            }
        }
        Some(("balance", sub)) => {
            let name = arg(sub, "name")?;
            let on = match opt_arg(sub, "on") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let id = id_for_account(conn, owner, name)?;
            let balance = store::account_balance(conn, owner, id, on)?;
            println!("{} on {}: {}", name, on, fmt_money(&balance, &get_currency(conn)?));
        }
        Some(("statement", sub)) => {
            let id = id_for_account(conn, owner, arg(sub, "name")?)?;
            let today = match opt_arg(sub, "today") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let st = cards::statement(conn, owner, id, today)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &st)? {
                let ccy = get_currency(conn)?;
                let data = vec![vec![
                    st.account.nome.clone(),
                    format!("{} -> {}", st.cycle.start, st.cycle.end),
                    st.cycle.due.to_string(),
                    st.transactions.to_string(),
                    fmt_money(&st.total, &ccy),
                ]];
                println!(
                    "{}",
                    pretty_table(&["Card", "Cycle", "Due", "Charges", "Total"], data)
                );
            }
        }
        Some(("deactivate", sub)) => {
            let name = arg(sub, "name")?;
            store::deactivate_account(conn, owner, id_for_account(conn, owner, name)?)?;
            println!("Deactivated account '{}'", name);
        }
        Some(("rm", sub)) => {
            let name = arg(sub, "name")?;
            store::remove_account(conn, owner, id_for_account(conn, owner, name)?)?;
            println!("Removed account '{}'", name);
        }
        _ => {}
    }
    Ok(())
}
