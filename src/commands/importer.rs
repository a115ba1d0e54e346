// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{EntryMode, Kind};
use crate::reconcile::{self, NewTransaction};
use crate::statements::{self, Dedup, ImportKey};
use crate::suggest::{self, CategoryMatcher};
use crate::utils::{
    arg, id_for_account, id_for_category, opt_arg, parse_date, parse_decimal, parse_id,
};
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use rusqlite::Connection;
use std::collections::{HashMap, hash_map::Entry};

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("csv", sub)) => {
            let path = arg(sub, "path")?;
            let summary = import_csv(conn, owner, path)?;
            print_summary(path, &summary);
            Ok(())
        }
        Some(("ofx", sub)) => {
            let path = arg(sub, "path")?;
            let summary = import_ofx(conn, owner, path, opt_arg(sub, "account"))?;
            print_summary(path, &summary);
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub reconciled: usize,
    /// Lines already present from an earlier import or manual entry.
    pub duplicates: usize,
}

fn print_summary(path: &str, summary: &ImportSummary) {
    println!(
        "Imported {} transaction(s) from {} ({} reconciled with projections, {} already recorded)",
        summary.imported, path, summary.reconciled, summary.duplicates
    );
}

fn cached(
    cache: &mut HashMap<String, i64>,
    key: &str,
    lookup: impl FnOnce() -> Result<i64>,
) -> Result<i64> {
    match cache.entry(key.to_string()) {
        Entry::Occupied(entry) => Ok(*entry.get()),
        Entry::Vacant(entry) => Ok(*entry.insert(lookup()?)),
    }
}

/// Columns: date, description, amount, kind, category, account, template, note.
/// A blank kind takes the sign of the amount. All rows commit together. Rows
/// already recorded with the same date, kind, amount and description are
/// skipped, so importing a file twice adds nothing.
pub fn import_csv(conn: &mut Connection, owner: i64, path: &str) -> Result<ImportSummary> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let tx = conn.transaction()?;
    let matcher = suggest::for_owner(&tx, owner)?;
    let mut dedup = Dedup::begin(&tx, owner)?;
    let mut account_cache: HashMap<String, i64> = HashMap::new();
    let mut category_cache: HashMap<String, i64> = HashMap::new();
    let mut summary = ImportSummary::default();

    for (line, result) in rdr.records().enumerate() {
        let rec = result?;
        let field = |i: usize| rec.get(i).map(str::trim).unwrap_or("");
        let row = line + 2;

        let date = parse_date(field(0)).with_context(|| format!("Row {}: bad date", row))?;
        let description = field(1);
        if description.is_empty() {
            return Err(anyhow!("Row {}: description missing", row));
        }
        let amount = parse_decimal(field(2)).with_context(|| format!("Row {}: bad amount", row))?;
        let tipo = match field(3) {
            "" if amount < rust_decimal::Decimal::ZERO => Kind::Expense,
            "" => Kind::Income,
            k => k.parse::<Kind>().with_context(|| format!("Row {}: bad kind", row))?,
        };
        let key = ImportKey {
            id_externo: None,
            data: date,
            valor: amount.abs(),
            tipo,
            descricao: description,
        };
        if let Some(existing) = dedup.claim(&tx, owner, &key)? {
            tracing::debug!(row, existing, "csv row already recorded");
            summary.duplicates += 1;
            continue;
        }

        let categoria_id = match field(4) {
            "" if tipo == Kind::Expense => matcher.suggest(description),
            "" => None,
            c => Some(cached(&mut category_cache, c, || id_for_category(&tx, owner, c))?),
        };
        let conta_id = match field(5) {
            "" => None,
            a => Some(cached(&mut account_cache, a, || id_for_account(&tx, owner, a))?),
        };
        let recorrente_id = match field(6) {
            "" => None,
            t => Some(parse_id(t)?),
        };
        let note = field(7);

        let recorded = reconcile::record_in(
            &tx,
            owner,
            NewTransaction {
                conta_id,
                categoria_id,
                descricao: description.to_string(),
                valor: amount.abs(),
                tipo,
                data: date,
                modo_lancamento: EntryMode::Manual,
                recorrente_id,
                observacao: (!note.is_empty()).then(|| note.to_string()),
                id_externo: None,
            },
        )
        .with_context(|| format!("Row {}", row))?;
        for w in &recorded.warnings {
            eprintln!("warning: row {}: {}", row, w);
        }
        summary.imported += 1;
        if recorded.replaced.is_some() {
            summary.reconciled += 1;
        }
    }
    tx.commit()?;
    Ok(summary)
}

/// Imports an OFX statement into `account`. Lines with a FITID seen before,
/// or matching a recorded entry by date, kind, amount and description, are
/// skipped. Everything commits together.
pub fn import_ofx(
    conn: &mut Connection,
    owner: i64,
    path: &str,
    account: Option<&str>,
) -> Result<ImportSummary> {
    let raw = std::fs::read(path).with_context(|| format!("Read OFX {}", path))?;
    let lines = statements::parse_ofx(&String::from_utf8_lossy(&raw))
        .with_context(|| format!("Parse OFX {}", path))?;

    let tx = conn.transaction()?;
    let conta_id = account.map(|a| id_for_account(&tx, owner, a)).transpose()?;
    let matcher = suggest::for_owner(&tx, owner)?;
    let mut dedup = Dedup::begin(&tx, owner)?;
    let mut summary = ImportSummary::default();

    for line in &lines {
        let tipo = line.kind();
        let key = ImportKey {
            id_externo: line.id_externo.as_deref(),
            data: line.data,
            valor: line.valor.abs(),
            tipo,
            descricao: &line.descricao,
        };
        if let Some(existing) = dedup.claim(&tx, owner, &key)? {
            tracing::debug!(fitid = ?line.id_externo, existing, "ofx line already recorded");
            summary.duplicates += 1;
            continue;
        }
        let recorded = reconcile::record_in(
            &tx,
            owner,
            NewTransaction {
                conta_id,
                categoria_id: match tipo {
                    Kind::Expense => matcher.suggest(&line.descricao),
                    Kind::Income => None,
                },
                descricao: line.descricao.clone(),
                valor: line.valor.abs(),
                tipo,
                data: line.data,
                modo_lancamento: EntryMode::SemiAutomatic,
                recorrente_id: None,
                observacao: None,
                id_externo: line.id_externo.clone(),
            },
        )
        .with_context(|| format!("OFX line {} '{}'", line.data, line.descricao))?;
        summary.imported += 1;
        if recorded.replaced.is_some() {
            summary.reconciled += 1;
        }
    }
    tx.commit()?;
    tracing::info!(
        imported = summary.imported,
        duplicates = summary.duplicates,
        "ofx import finished"
    );
    Ok(summary)
}
