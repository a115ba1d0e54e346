// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Kind;
use crate::store;
use crate::utils::{arg, id_for_category, maybe_print_json, opt_arg, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let kind: Kind = arg(sub, "kind")?.parse()?;
            let cat = store::create_category(conn, owner, arg(sub, "name")?, kind, opt_arg(sub, "icon"))?;
            println!("Added category '{}' ({})", cat.nome, cat.tipo);
        }
        Some(("list", sub)) => {
            let kind = opt_arg(sub, "kind").map(str::parse::<Kind>).transpose()?;
            let cats = store::list_categories(conn, owner, kind, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &cats)? {
                let data = cats
                    .iter()
                    .map(|c| {
                        vec![
                            c.id.to_string(),
                            format!("{} {}", c.icone, c.nome),
                            c.tipo.to_string(),
                            if c.ativo { "yes".into() } else { "no".into() },
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["ID", "Category", "Kind", "Active"], data));
            }
        }
        Some(("deactivate", sub)) => {
            let name = arg(sub, "name")?;
            store::deactivate_category(conn, owner, id_for_category(conn, owner, name)?)?;
            println!("Deactivated category '{}'", name);
        }
        Some(("rm", sub)) => {
            let name = arg(sub, "name")?;
            store::remove_category(conn, owner, id_for_category(conn, owner, name)?)?;
            println!("Removed category '{}'", name);
        }
        Some(("seed", _)) => {
            let n = store::seed_default_categories(conn, owner)?;
            println!("Inserted {} default categories", n);
        }
        _ => {}
    }
    Ok(())
}
