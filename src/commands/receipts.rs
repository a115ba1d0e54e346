// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::StagingStatus;
use crate::receipts::{self, Ingested, Receipt};
use crate::utils::{
    arg, id_for_account, id_for_category, maybe_print_json, opt_arg, opt_id, parse_id, pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("ingest", sub)) => {
            let path = arg(sub, "file")?;
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Read receipt {}", path))?;
            let receipt = Receipt::from_json(&raw)
                .with_context(|| format!("Parse receipt {}", path))?;
            let conta_id = opt_arg(sub, "account")
                .map(|a| id_for_account(conn, owner, a))
                .transpose()?;
            if sub.get_flag("stage") {
                let staged = receipts::stage(conn, owner, &receipt, conta_id)?;
                println!(
                    "Staged receipt {} from '{}' ({} item(s), {} without a category)",
                    staged.id,
                    receipt.establishment,
                    receipt.items.len(),
                    staged.suggestions.needs_review
                );
            } else {
                let ingested = receipts::ingest_automatic(conn, owner, &receipt, conta_id)?;
                report(&ingested);
            }
        }
        Some(("pending", sub)) => {
            let staged = receipts::list_staged(conn, owner, Some(StagingStatus::Pending))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &staged)? {
                let data = staged
                    .iter()
                    .map(|s| {
                        vec![
                            s.id.to_string(),
                            s.receipt.date.to_string(),
                            s.receipt.establishment.clone(),
                            s.receipt.total.to_string(),
                            s.receipt.items.len().to_string(),
                            opt_id(s.conta_id),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Date", "Establishment", "Total", "Items", "Account"], data)
                );
            }
        }
        Some(("confirm", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let categoria_id = opt_arg(sub, "category")
                .map(|c| id_for_category(conn, owner, c))
                .transpose()?;
            let ingested = receipts::confirm(conn, owner, id, categoria_id)?;
            report(&ingested);
        }
        Some(("discard", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            receipts::discard(conn, owner, id)?;
            println!("Discarded staged receipt {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn report(ingested: &Ingested) {
    for w in &ingested.warnings {
        eprintln!("warning: {}", w);
    }
    println!(
        "Recorded '{}' {} on {} as transaction {} with {} item(s)",
        ingested.transaction.descricao,
        ingested.transaction.valor,
        ingested.transaction.data,
        ingested.transaction.id,
        ingested.items.len()
    );
    if ingested.needs_review > 0 {
        println!("{} item(s) need a category", ingested.needs_review);
    }
}
