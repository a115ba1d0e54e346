// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Kind;
use crate::projection;
use crate::store::{self, NewTemplate};
use crate::utils::{
    arg, id_for_account, id_for_category, maybe_print_json, opt_arg, opt_id, parse_decimal,
    parse_id, parse_period, pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let tipo: Kind = arg(sub, "kind")?.parse()?;
            let day_raw = arg(sub, "day")?;
            let dia_do_mes = day_raw
                .parse::<u32>()
                .with_context(|| format!("Invalid day of month '{}'", day_raw))?;
            let categoria_id = opt_arg(sub, "category")
                .map(|c| id_for_category(conn, owner, c))
                .transpose()?;
            let conta_id = opt_arg(sub, "account")
                .map(|a| id_for_account(conn, owner, a))
                .transpose()?;
            let t = store::create_template(
                conn,
                owner,
                NewTemplate {
                    conta_id,
                    categoria_id,
                    descricao: arg(sub, "description")?.to_string(),
                    valor: parse_decimal(arg(sub, "amount")?)?,
                    tipo,
                    dia_do_mes,
                },
            )?;
            println!(
                "Added recurring template {} '{}' ({} {} on day {})",
                t.id, t.descricao, t.tipo, t.valor, t.dia_do_mes
            );
        }
        Some(("list", sub)) => {
            let templates = store::list_templates(conn, owner, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &templates)? {
                let data = templates
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.to_string(),
                            t.descricao.clone(),
                            t.tipo.to_string(),
                            t.valor.to_string(),
                            t.dia_do_mes.to_string(),
                            opt_id(t.categoria_id),
                            opt_id(t.conta_id),
                            t.ativo.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Description", "Kind", "Amount", "Day", "Category", "Account", "Active"],
                        data
                    )
                );
            }
        }
        Some(("deactivate", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            store::set_template_active(conn, owner, id, false)?;
            println!("Deactivated template {}; existing rows are kept", id);
        }
        Some(("reactivate", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            store::set_template_active(conn, owner, id, true)?;
            println!("Reactivated template {}", id);
        }
        _ => {}
    }
    Ok(())
}

/// `project --month YYYY-MM [--months N]`
pub fn project(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    let start = parse_period(arg(m, "month")?)?;
    let months_raw = arg(m, "months")?;
    let months = months_raw
        .parse::<u32>()
        .with_context(|| format!("Invalid month count '{}'", months_raw))?;
    let report = projection::project_months(conn, owner, start, months)?;
    for t in &report.created {
        println!("  {} {} {} ({})", t.data, t.descricao, t.valor, t.tipo);
    }
    println!(
        "Projected {} transaction(s), {} already present",
        report.created.len(),
        report.skipped
    );
    Ok(())
}
