// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::aggregate;
use crate::models::BudgetNature;
use crate::utils::{
    arg, fmt_money, get_currency, id_for_category, maybe_print_json, parse_decimal, parse_period,
    pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

/// Handles both `budget` (limits) and `goal` (targets); `nature` says which.
pub fn handle(
    conn: &Connection,
    owner: i64,
    nature: BudgetNature,
    m: &clap::ArgMatches,
) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, owner, nature, sub)?,
        Some(("list", sub)) => list(conn, owner, nature, sub)?,
        Some(("status", sub)) => status(conn, owner, sub)?,
        Some(("progress", sub)) => progress(conn, owner, sub)?,
        Some(("rm", sub)) => rm(conn, owner, nature, sub)?,
        _ => {}
    }
    Ok(())
}

fn label(nature: BudgetNature) -> &'static str {
    match nature {
        BudgetNature::Limit => "budget",
        BudgetNature::Goal => "goal",
    }
}

fn set(conn: &Connection, owner: i64, nature: BudgetNature, sub: &clap::ArgMatches) -> Result<()> {
    let cat = arg(sub, "category")?;
    let amount = parse_decimal(arg(sub, "amount")?)?;
    let cat_id = id_for_category(conn, owner, cat)?;
    let budget = aggregate::set_budget(conn, owner, cat_id, amount, nature)?;
    println!("{} set for {} = {}", label(nature), cat, budget.valor_limite);
    Ok(())
}

fn list(conn: &Connection, owner: i64, nature: BudgetNature, sub: &clap::ArgMatches) -> Result<()> {
    let budgets = aggregate::list_budgets(conn, owner, Some(nature), sub.get_flag("all"))?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &budgets)? {
        let mut data = Vec::new();
        for b in &budgets {
            let name = crate::store::get_category(conn, owner, b.categoria_id)?
                .map(|c| c.nome)
                .unwrap_or_default();
            data.push(vec![
                b.id.to_string(),
                name,
                b.valor_limite.to_string(),
                b.periodo.clone(),
                b.ativo.to_string(),
            ]);
        }
        println!(
            "{}",
            pretty_table(&["ID", "Category", "Limit", "Period", "Active"], data)
        );
    }
    Ok(())
}

fn status(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let period = parse_period(arg(sub, "month")?)?;
    let rows = aggregate::budget_status(conn, owner, period)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        let ccy = get_currency(conn)?;
        let data = rows
            .iter()
            .map(|s| {
                vec![
                    s.categoria.clone(),
                    fmt_money(&s.limite, &ccy),
                    fmt_money(&s.realizado, &ccy),
                    fmt_money(&s.previsto, &ccy),
                    fmt_money(&s.consumido, &ccy),
                    fmt_money(&s.restante, &ccy),
                    s.tier.as_str().to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Category", "Limit", "Realized", "Projected", "Consumed", "Left", "Status"],
                data
            )
        );
    }
    Ok(())
}

fn progress(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let period = parse_period(arg(sub, "month")?)?;
    let rows = aggregate::goal_progress(conn, owner, period)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        let ccy = get_currency(conn)?;
        let data = rows
            .iter()
            .map(|g| {
                vec![
                    g.categoria.clone(),
                    fmt_money(&g.alvo, &ccy),
                    fmt_money(&g.progresso, &ccy),
                    format!("{:.1}%", g.ratio * rust_decimal::Decimal::ONE_HUNDRED),
                    if g.atingida { "reached".into() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Category", "Target", "Progress", "%", ""], data)
        );
    }
    Ok(())
}

fn rm(conn: &Connection, owner: i64, nature: BudgetNature, sub: &clap::ArgMatches) -> Result<()> {
    let cat = arg(sub, "category")?;
    let cat_id = id_for_category(conn, owner, cat)?;
    let budget = aggregate::list_budgets(conn, owner, Some(nature), false)?
        .into_iter()
        .find(|b| b.categoria_id == cat_id)
        .with_context(|| format!("No active {} for '{}'", label(nature), cat))?;
    aggregate::deactivate_budget(conn, owner, budget.id)?;
    println!("Removed {} for '{}'", label(nature), cat);
    Ok(())
}
