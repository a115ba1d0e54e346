// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::Warning;
use crate::models::{Kind, Status, Transaction};
use crate::reconcile::{self, NewTransaction, Realization, TransactionFilter, TransactionPatch};
use crate::suggest::{self, CategoryMatcher};
use crate::utils::{
    arg, id_for_account, id_for_category, maybe_print_json, opt_arg, opt_id, parse_date,
    parse_decimal, parse_id, parse_period, pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, owner, sub)?,
        Some(("list", sub)) => list(conn, owner, sub)?,
        Some(("realize", sub)) => realize(conn, owner, sub)?,
        Some(("edit", sub)) => edit(conn, owner, sub)?,
        Some(("rm", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let deleted = reconcile::delete_transaction(conn, owner, id)?;
            println!("Deleted transaction {}", deleted.removed.id);
            if let Some(p) = deleted.restored {
                println!("Projection {} is outstanding again", p);
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_warnings(warnings: &[Warning]) {
    for w in warnings {
        eprintln!("warning: {}", w);
    }
}

fn add(conn: &mut Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(arg(sub, "date")?)?;
    let description = arg(sub, "description")?;
    let amount = parse_decimal(arg(sub, "amount")?)?;
    let tipo: Kind = arg(sub, "kind")?.parse()?;

    let mut new = NewTransaction::manual(description, amount, tipo, date);
    new.conta_id = opt_arg(sub, "account")
        .map(|a| id_for_account(conn, owner, a))
        .transpose()?;
    new.categoria_id = match opt_arg(sub, "category") {
        Some(c) => Some(id_for_category(conn, owner, c)?),
        None if tipo == Kind::Expense => {
            let suggested = suggest::for_owner(conn, owner)?.suggest(description);
            if suggested.is_some() {
                println!("Category suggested from description");
            }
            suggested
        }
        None => None,
    };
    new.recorrente_id = opt_arg(sub, "template").map(parse_id).transpose()?;
    new.observacao = opt_arg(sub, "note").map(str::to_string);

    let recorded = reconcile::record(conn, owner, new)?;
    print_warnings(&recorded.warnings);
    let t = &recorded.transaction;
    match recorded.replaced {
        Some(p) => println!(
            "Recorded {} {} on {} '{}' (id {}), reconciling projection {}",
            t.tipo, t.valor, t.data, t.descricao, t.id, p
        ),
        None => println!(
            "Recorded {} {} on {} '{}' (id {})",
            t.tipo, t.valor, t.data, t.descricao, t.id
        ),
    }
    Ok(())
}

fn list(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let filter = TransactionFilter {
        period: opt_arg(sub, "month").map(parse_period).transpose()?,
        status: opt_arg(sub, "status").map(str::parse::<Status>).transpose()?,
        categoria_id: opt_arg(sub, "category")
            .map(|c| id_for_category(conn, owner, c))
            .transpose()?,
        conta_id: opt_arg(sub, "account")
            .map(|a| id_for_account(conn, owner, a))
            .transpose()?,
        limit: opt_arg(sub, "limit")
            .map(|l| l.parse::<usize>().with_context(|| format!("Invalid limit '{}'", l)))
            .transpose()?,
    };
    let data = reconcile::list_transactions(conn, owner, &filter)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Description", "Kind", "Amount", "Status", "Mode", "Category", "Account", "Template", "Replaces"],
                data.iter().map(row).collect(),
            )
        );
    }
    Ok(())
}

fn row(t: &Transaction) -> Vec<String> {
    vec![
        t.id.to_string(),
        t.data.to_string(),
        t.descricao.clone(),
        t.tipo.to_string(),
        t.valor.to_string(),
        t.status.to_string(),
        t.modo_lancamento.to_string(),
        opt_id(t.categoria_id),
        opt_id(t.conta_id),
        opt_id(t.recorrente_id),
        opt_id(t.transacao_prevista_id),
    ]
}

fn realize(conn: &mut Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_id(arg(sub, "id")?)?;
    let overrides = Realization {
        valor: opt_arg(sub, "amount").map(parse_decimal).transpose()?,
        data: opt_arg(sub, "date").map(parse_date).transpose()?,
        conta_id: opt_arg(sub, "account")
            .map(|a| id_for_account(conn, owner, a))
            .transpose()?,
        observacao: opt_arg(sub, "note").map(str::to_string),
    };
    let recorded = reconcile::realize_projection(conn, owner, id, overrides)?;
    print_warnings(&recorded.warnings);
    println!(
        "Projection {} realized as transaction {} ({} on {})",
        id, recorded.transaction.id, recorded.transaction.valor, recorded.transaction.data
    );
    Ok(())
}

fn edit(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_id(arg(sub, "id")?)?;
    let mut patch = TransactionPatch {
        valor: opt_arg(sub, "amount").map(parse_decimal).transpose()?,
        data: opt_arg(sub, "date").map(parse_date).transpose()?,
        descricao: opt_arg(sub, "description").map(str::to_string),
        observacao: opt_arg(sub, "note").map(|n| Some(n.to_string())),
        ..Default::default()
    };
    if let Some(c) = opt_arg(sub, "category") {
        patch.categoria_id = Some(Some(id_for_category(conn, owner, c)?));
    } else if sub.get_flag("clear_category") {
        patch.categoria_id = Some(None);
    }
    if let Some(a) = opt_arg(sub, "account") {
        patch.conta_id = Some(Some(id_for_account(conn, owner, a)?));
    } else if sub.get_flag("clear_account") {
        patch.conta_id = Some(None);
    }
    let updated = reconcile::update_transaction(conn, owner, id, patch)?;
    print_warnings(&updated.warnings);
    println!("Updated transaction {}", updated.transaction.id);
    Ok(())
}
