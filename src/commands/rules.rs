// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{arg, id_for_category, parse_id, pretty_table};
use anyhow::{Result, anyhow};
use regex::Regex;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let pattern = arg(sub, "pattern")?;
            Regex::new(pattern)
                .map_err(|err| anyhow!("Invalid regex pattern '{}': {}", pattern, err))?;
            let cat = arg(sub, "category")?;
            let cat_id = id_for_category(conn, owner, cat)?;
            conn.execute(
                "INSERT INTO regras(user_id, pattern, categoria_id) VALUES (?1,?2,?3)",
                params![owner, pattern, cat_id],
            )?;
            println!("Added rule: /{}/ -> {}", pattern, cat);
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.pattern, COALESCE(c.nome,'') FROM regras r
                 LEFT JOIN categorias c ON c.id=r.categoria_id
                 WHERE r.user_id=?1 ORDER BY r.id DESC",
            )?;
            let rows = stmt.query_map(params![owner], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (id, pat, cat) = row?;
                data.push(vec![id.to_string(), pat, cat]);
            }
            println!("{}", pretty_table(&["ID", "Pattern", "Category"], data));
        }
        Some(("rm", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let n = conn.execute(
                "DELETE FROM regras WHERE id=?1 AND user_id=?2",
                params![id, owner],
            )?;
            if n == 0 {
                return Err(anyhow!("Rule {} not found", id));
            }
            println!("Removed rule {}", id);
        }
        _ => {}
    }
    Ok(())
}
