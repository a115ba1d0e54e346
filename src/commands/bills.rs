// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::bills::{self, BillFilter, BillPatch, NewBill};
use crate::models::{Bill, BillKind, PaymentMethod};
use crate::utils::{
    arg, fmt_money, get_currency, id_for_account, id_for_category, maybe_print_json, opt_arg,
    parse_date, parse_decimal, parse_id, parse_period, pretty_table,
};
use anyhow::Result;
use chrono::Local;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let bill = bills::create_bill(
                conn,
                owner,
                NewBill {
                    descricao: arg(sub, "description")?.to_string(),
                    valor: parse_decimal(arg(sub, "amount")?)?,
                    tipo: arg(sub, "kind")?.parse::<BillKind>()?,
                    data_vencimento: parse_date(arg(sub, "due")?)?,
                    categoria_id: opt_arg(sub, "category")
                        .map(|c| id_for_category(conn, owner, c))
                        .transpose()?,
                    conta_id: opt_arg(sub, "account")
                        .map(|a| id_for_account(conn, owner, a))
                        .transpose()?,
                    forma_pagamento: arg(sub, "method")?.parse::<PaymentMethod>()?,
                },
            )?;
            println!(
                "Added bill {} '{}' due {}",
                bill.id, bill.descricao, bill.data_vencimento
            );
        }
        Some(("list", sub)) => {
            let pago = if sub.get_flag("paid") {
                Some(true)
            } else if sub.get_flag("open") {
                Some(false)
            } else {
                None
            };
            let filter = BillFilter {
                tipo: opt_arg(sub, "kind").map(str::parse::<BillKind>).transpose()?,
                pago,
                period: opt_arg(sub, "month").map(parse_period).transpose()?,
            };
            let list = bills::list_bills(conn, owner, &filter)?;
            print_bills(conn, sub, &list)?;
        }
        Some(("overdue", sub)) => {
            let today = match opt_arg(sub, "today") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let list = bills::overdue(conn, owner, today)?;
            print_bills(conn, sub, &list)?;
        }
        Some(("pay", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let on = match opt_arg(sub, "date") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let conta_id = opt_arg(sub, "account")
                .map(|a| id_for_account(conn, owner, a))
                .transpose()?;
            let settled = bills::mark_paid(conn, owner, id, on, conta_id)?;
            for w in &settled.recorded.warnings {
                eprintln!("warning: {}", w);
            }
            println!(
                "Settled bill {} on {} (transaction {})",
                id, on, settled.recorded.transaction.id
            );
        }
        Some(("reopen", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            bills::mark_pending(conn, owner, id)?;
            println!("Bill {} is open again; its payment was removed", id);
        }
        Some(("edit", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let categoria_id = if sub.get_flag("clear_category") {
                Some(None)
            } else {
                opt_arg(sub, "category")
                    .map(|c| id_for_category(conn, owner, c).map(Some))
                    .transpose()?
            };
            let patch = BillPatch {
                descricao: opt_arg(sub, "description").map(str::to_string),
                valor: opt_arg(sub, "amount").map(parse_decimal).transpose()?,
                data_vencimento: opt_arg(sub, "due").map(parse_date).transpose()?,
                forma_pagamento: opt_arg(sub, "method")
                    .map(str::parse::<PaymentMethod>)
                    .transpose()?,
                categoria_id,
            };
            let bill = bills::update_bill(conn, owner, id, patch)?;
            println!("Updated bill {} '{}'", bill.id, bill.descricao);
        }
        Some(("rm", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            bills::delete_bill(conn, owner, id)?;
            println!("Removed bill {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn print_bills(conn: &Connection, sub: &clap::ArgMatches, list: &[Bill]) -> Result<()> {
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
        return Ok(());
    }
    let ccy = get_currency(conn)?;
    let data = list
        .iter()
        .map(|b| {
            vec![
                b.id.to_string(),
                b.data_vencimento.to_string(),
                b.tipo.to_string(),
                b.descricao.clone(),
                fmt_money(&b.valor, &ccy),
                b.forma_pagamento.to_string(),
                match b.data_pagamento {
                    Some(d) => format!("paga em {}", d),
                    None => "pendente".to_string(),
                },
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["ID", "Due", "Kind", "Description", "Amount", "Method", "Status"], data)
    );
    Ok(())
}
