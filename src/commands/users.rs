// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use crate::utils::{arg, maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user = store::create_user(conn, arg(sub, "email")?, arg(sub, "name")?)?;
            let seeded = if sub.get_flag("no-defaults") {
                0
            } else {
                store::seed_default_categories(conn, user.id)?
            };
            println!(
                "Added user '{}' (id {}, {} default categories)",
                user.email, user.id, seeded
            );
        }
        Some(("list", sub)) => {
            let users = store::list_users(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &users)? {
                let data = users
                    .iter()
                    .map(|u| {
                        vec![
                            u.id.to_string(),
                            u.email.clone(),
                            u.nome.clone(),
                            u.ativo.to_string(),
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["ID", "Email", "Name", "Active"], data));
            }
        }
        Some(("rm", sub)) => {
            let email = arg(sub, "email")?;
            let user = store::find_user(conn, email)?
                .with_context(|| format!("User '{}' not found", email))?;
            store::remove_user(conn, user.id)?;
            println!("Removed user '{}' and all their data", user.email);
        }
        _ => {}
    }
    Ok(())
}
