// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use caderneta::config::{self, Settings};
use caderneta::models::BudgetNature;
use caderneta::{cli, commands, db, utils};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let settings = Settings::from_matches(&matches)?;
    config::init_logging(settings.log_level.as_deref());

    let mut conn = db::open_or_init(&settings.db_path)?;

    match matches.subcommand() {
        Some(("init", sub)) => {
            if let Some(ccy) = utils::opt_arg(sub, "currency") {
                utils::set_currency(&conn, ccy)?;
            }
            println!("Database initialized at {}", settings.db_path.display());
        }
        Some(("user", sub)) => commands::users::handle(&conn, sub)?,
        Some((name, sub)) => {
            let owner = settings.owner(&conn)?;
            tracing::debug!(owner, command = name, "dispatch");
            match name {
                "category" => commands::categories::handle(&conn, owner, sub)?,
                "account" => commands::accounts::handle(&conn, owner, sub)?,
                "recurring" => commands::recurring::handle(&conn, owner, sub)?,
                "project" => commands::recurring::project(&conn, owner, sub)?,
                "tx" => commands::transactions::handle(&mut conn, owner, sub)?,
                "budget" => commands::budgets::handle(&conn, owner, BudgetNature::Limit, sub)?,
                "goal" => commands::budgets::handle(&conn, owner, BudgetNature::Goal, sub)?,
                "report" => commands::reports::handle(&conn, owner, sub)?,
                "invest" => commands::investments::handle(&conn, owner, sub)?,
                "receipt" => commands::receipts::handle(&mut conn, owner, sub)?,
                "bill" => commands::bills::handle(&mut conn, owner, sub)?,
                "rules" => commands::rules::handle(&conn, owner, sub)?,
                "import" => commands::importer::handle(&mut conn, owner, sub)?,
                "export" => commands::exporter::handle(&conn, owner, sub)?,
                "doctor" => commands::doctor::handle(&conn, owner)?,
                _ => {}
            }
        }
        None => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
