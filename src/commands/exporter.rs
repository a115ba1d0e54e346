// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{arg, opt_arg, parse_period};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use serde_json::json;

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, owner, sub),
        _ => Ok(()),
    }
}

type ExportRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
);

const HEADER: [&str; 11] = [
    "id",
    "date",
    "description",
    "kind",
    "amount",
    "status",
    "mode",
    "category",
    "account",
    "template_id",
    "replaces",
];

fn export_transactions(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = arg(sub, "format")?.to_lowercase();
    let out = arg(sub, "out")?;
    let (from, to) = match opt_arg(sub, "month").map(parse_period).transpose()? {
        Some(p) => (Some(p.first_day()), Some(p.last_day())),
        None => (None, None),
    };

    let mut stmt = conn.prepare(
        "SELECT t.id, t.data, t.descricao, t.tipo, t.valor, t.status, t.modo_lancamento,
                c.nome, a.nome, t.recorrente_id, t.transacao_prevista_id
         FROM transacoes t
         LEFT JOIN categorias c ON t.categoria_id=c.id
         LEFT JOIN contas a ON t.conta_id=a.id
         WHERE t.user_id=?1 AND (?2 IS NULL OR t.data>=?2) AND (?3 IS NULL OR t.data<=?3)
         ORDER BY t.data, t.id",
    )?;
    let rows = stmt.query_map(params![owner, from, to], |r| -> rusqlite::Result<ExportRow> {
        Ok((
            r.get(0)?,
            r.get(1)?,
            r.get(2)?,
            r.get(3)?,
            r.get(4)?,
            r.get(5)?,
            r.get(6)?,
            r.get(7)?,
            r.get(8)?,
            r.get(9)?,
            r.get(10)?,
        ))
    })?;
    let rows: Vec<ExportRow> = rows.collect::<rusqlite::Result<_>>()?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record(HEADER)?;
            for (id, d, desc, kind, amt, status, mode, cat, acct, tpl, rep) in &rows {
                wtr.write_record([
                    id.to_string(),
                    d.clone(),
                    desc.clone(),
                    kind.clone(),
                    amt.clone(),
                    status.clone(),
                    mode.clone(),
                    cat.clone().unwrap_or_default(),
                    acct.clone().unwrap_or_default(),
                    tpl.map(|v| v.to_string()).unwrap_or_default(),
                    rep.map(|v| v.to_string()).unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = rows
                .iter()
                .map(|(id, d, desc, kind, amt, status, mode, cat, acct, tpl, rep)| {
                    json!({
                        "id": id, "date": d, "description": desc, "kind": kind, "amount": amt,
                        "status": status, "mode": mode, "category": cat, "account": acct,
                        "template_id": tpl, "replaces": rep
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => return Err(anyhow!("Unknown format: {} (use csv|json)", fmt)),
    }
    println!("Exported {} transaction(s) to {}", rows.len(), out);
    Ok(())
}
