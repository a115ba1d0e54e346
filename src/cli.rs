// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn flag(name: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue)
}

fn opt(name: &'static str) -> Arg {
    Arg::new(name).long(name)
}

fn req(name: &'static str) -> Arg {
    Arg::new(name).long(name).required(true)
}

fn json_flags() -> [Arg; 2] {
    [
        flag("json").help("Print JSON"),
        flag("jsonl").help("Print one JSON object per line"),
    ]
}

fn as_of() -> Arg {
    opt("as-of")
        .id("as_of")
        .help("Only use knowledge recorded up to this timestamp (YYYY-MM-DD[ HH:MM:SS])")
}

const PAYMENT_METHODS: [&str; 6] = ["cartao", "pix", "debito", "dinheiro", "transferencia", "outro"];

pub fn build_cli() -> Command {
    Command::new("caderneta")
        .version(crate_version!())
        .about("Recurring transactions, reconciliation, budgets and investment balances")
        .arg(
            opt("db")
                .global(true)
                .env("CADERNETA_DB")
                .help("SQLite database path"),
        )
        .arg(
            opt("user")
                .global(true)
                .env("CADERNETA_USER")
                .help("Owner email"),
        )
        .arg(
            opt("log-level")
                .id("log_level")
                .global(true)
                .env("CADERNETA_LOG")
                .help("Log level or filter directive (falls back to RUST_LOG)"),
        )
        .subcommand(
            Command::new("init")
                .about("Create the database")
                .arg(opt("currency").help("Display currency label")),
        )
        .subcommand(
            Command::new("user")
                .about("Manage users")
                .subcommand(
                    Command::new("add")
                        .arg(req("email"))
                        .arg(req("name"))
                        .arg(flag("no-defaults").help("Skip default categories")),
                )
                .subcommand(Command::new("list").args(json_flags()))
                .subcommand(Command::new("rm").arg(req("email"))),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add")
                        .arg(req("name"))
                        .arg(req("kind").value_parser(["receita", "despesa"]))
                        .arg(opt("icon")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(opt("kind").value_parser(["receita", "despesa"]))
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("deactivate").arg(req("name")))
                .subcommand(Command::new("rm").arg(req("name")))
                .subcommand(Command::new("seed").about("Insert the default categories")),
        )
        .subcommand(
            Command::new("account")
                .about("Manage accounts and cards")
                .subcommand(
                    Command::new("add")
                        .arg(req("name"))
                        .arg(
                            opt("kind")
                                .default_value("corrente")
                                .value_parser(["corrente", "poupanca", "carteira", "cartao_credito"]),
                        )
                        .arg(opt("opening").default_value("0"))
                        .arg(opt("opening-date").id("opening_date"))
                        .arg(opt("closing-day").id("closing_day"))
                        .arg(opt("due-day").id("due_day")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("balance").arg(req("name")).arg(opt("on")))
                .subcommand(
                    Command::new("statement")
                        .about("Current credit card cycle")
                        .arg(req("name"))
                        .arg(opt("today"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("deactivate").arg(req("name")))
                .subcommand(Command::new("rm").arg(req("name"))),
        )
        .subcommand(
            Command::new("recurring")
                .about("Manage recurring templates")
                .subcommand(
                    Command::new("add")
                        .arg(req("description"))
                        .arg(req("amount"))
                        .arg(req("kind").value_parser(["receita", "despesa"]))
                        .arg(req("day").help("Day of month (1-31, clamped to month length)"))
                        .arg(opt("category"))
                        .arg(opt("account")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("deactivate").arg(req("id")))
                .subcommand(Command::new("reactivate").arg(req("id"))),
        )
        .subcommand(
            Command::new("project")
                .about("Generate projected transactions from active templates")
                .arg(req("month"))
                .arg(opt("months").default_value("1")),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and manage transactions")
                .subcommand(
                    Command::new("add")
                        .arg(req("date"))
                        .arg(req("description"))
                        .arg(req("amount"))
                        .arg(req("kind").value_parser(["receita", "despesa"]))
                        .arg(opt("category"))
                        .arg(opt("account"))
                        .arg(opt("template").help("Recurring template id to reconcile against"))
                        .arg(opt("note")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(opt("month"))
                        .arg(opt("status").value_parser(["realizada", "prevista", "substituida"]))
                        .arg(opt("category"))
                        .arg(opt("account"))
                        .arg(opt("limit"))
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("realize")
                        .about("Mark a projected transaction as happened")
                        .arg(req("id"))
                        .arg(opt("amount"))
                        .arg(opt("date"))
                        .arg(opt("account"))
                        .arg(opt("note")),
                )
                .subcommand(
                    Command::new("edit")
                        .arg(req("id"))
                        .arg(opt("date"))
                        .arg(opt("description"))
                        .arg(opt("amount"))
                        .arg(opt("category"))
                        .arg(opt("account"))
                        .arg(opt("note"))
                        .arg(flag("clear-category").id("clear_category"))
                        .arg(flag("clear-account").id("clear_account")),
                )
                .subcommand(Command::new("rm").arg(req("id"))),
        )
        .subcommand(
            Command::new("budget")
                .about("Monthly spending limits")
                .subcommand(
                    Command::new("set")
                        .arg(req("category"))
                        .arg(req("amount")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("status").arg(req("month")).args(json_flags()))
                .subcommand(Command::new("rm").arg(req("category"))),
        )
        .subcommand(
            Command::new("goal")
                .about("Monthly targets")
                .subcommand(
                    Command::new("set")
                        .arg(req("category"))
                        .arg(req("amount")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("progress").arg(req("month")).args(json_flags()))
                .subcommand(Command::new("rm").arg(req("category"))),
        )
        .subcommand(
            Command::new("report")
                .about("Period reports")
                .subcommand(Command::new("totals").arg(req("month")).args(json_flags()))
                .subcommand(
                    Command::new("by-category")
                        .arg(req("month"))
                        .arg(opt("kind").value_parser(["receita", "despesa"]))
                        .args(json_flags()),
                ),
        )
        .subcommand(
            Command::new("invest")
                .about("Investment balances with knowledge history")
                .subcommand(Command::new("add").arg(req("name")))
                .subcommand(
                    Command::new("list")
                        .arg(flag("all").help("Include inactive"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("rm").arg(req("name")))
                .subcommand(
                    Command::new("record")
                        .arg(req("name"))
                        .arg(req("date").help("Reference date the balance is about"))
                        .arg(req("balance"))
                        .arg(opt("known-at").id("known_at").help("When this became known (default: now)")),
                )
                .subcommand(
                    Command::new("show")
                        .arg(req("name"))
                        .arg(req("date"))
                        .arg(as_of()),
                )
                .subcommand(
                    Command::new("series")
                        .arg(req("name"))
                        .arg(req("from"))
                        .arg(req("to"))
                        .arg(as_of())
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("chart")
                        .arg(req("name"))
                        .arg(req("from").help("First month, YYYY-MM"))
                        .arg(opt("months").default_value("12"))
                        .arg(as_of())
                        .args(json_flags()),
                )
                .subcommand(Command::new("total").arg(req("date")).arg(as_of()))
                .subcommand(
                    Command::new("history")
                        .arg(req("name"))
                        .arg(req("date"))
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("selic")
                        .about("Selic target rate and indexed yield estimates")
                        .subcommand(Command::new("fetch").about("Fetch the latest rate from the BCB"))
                        .subcommand(
                            Command::new("set")
                                .arg(req("rate").help("% a.a."))
                                .arg(opt("date")),
                        )
                        .subcommand(Command::new("show"))
                        .subcommand(
                            Command::new("estimate")
                                .arg(req("days"))
                                .arg(opt("name").help("Investment whose balance on --on is the principal"))
                                .arg(opt("principal").conflicts_with("name"))
                                .arg(opt("percent").default_value("100").help("% of the Selic paid"))
                                .arg(opt("rate").help("% a.a. (default: latest stored)"))
                                .arg(opt("on").help("Start date (default: today)")),
                        ),
                ),
        )
        .subcommand(
            Command::new("receipt")
                .about("Ingest receipts (JSON)")
                .subcommand(
                    Command::new("ingest")
                        .arg(req("file"))
                        .arg(opt("account"))
                        .arg(flag("stage").help("Stage for review instead of writing")),
                )
                .subcommand(Command::new("pending").args(json_flags()))
                .subcommand(
                    Command::new("confirm")
                        .arg(req("id"))
                        .arg(opt("category")),
                )
                .subcommand(Command::new("discard").arg(req("id"))),
        )
        .subcommand(
            Command::new("bill")
                .about("Bills to pay or receive")
                .subcommand(
                    Command::new("add")
                        .arg(req("description"))
                        .arg(req("amount"))
                        .arg(req("due").help("Due date, YYYY-MM-DD"))
                        .arg(opt("kind").default_value("pagar").value_parser(["pagar", "receber"]))
                        .arg(opt("method").default_value("outro").value_parser(PAYMENT_METHODS))
                        .arg(opt("category"))
                        .arg(opt("account")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(opt("kind").value_parser(["pagar", "receber"]))
                        .arg(opt("month").help("Month of the due date, YYYY-MM"))
                        .arg(flag("open").help("Only unpaid bills").conflicts_with("paid"))
                        .arg(flag("paid").help("Only settled bills"))
                        .args(json_flags()),
                )
                .subcommand(Command::new("overdue").arg(opt("today")).args(json_flags()))
                .subcommand(
                    Command::new("pay")
                        .about("Settle a bill, recording its transaction")
                        .arg(req("id"))
                        .arg(opt("date").help("Payment date (default: today)"))
                        .arg(opt("account")),
                )
                .subcommand(
                    Command::new("reopen")
                        .about("Undo a payment")
                        .arg(req("id")),
                )
                .subcommand(
                    Command::new("edit")
                        .arg(req("id"))
                        .arg(opt("description"))
                        .arg(opt("amount"))
                        .arg(opt("due"))
                        .arg(opt("method").value_parser(PAYMENT_METHODS))
                        .arg(opt("category"))
                        .arg(flag("clear-category").id("clear_category")),
                )
                .subcommand(Command::new("rm").arg(req("id"))),
        )
        .subcommand(
            Command::new("rules")
                .about("Regex categorization rules")
                .subcommand(
                    Command::new("add")
                        .arg(req("pattern"))
                        .arg(req("category")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(req("id"))),
        )
        .subcommand(
            Command::new("import")
                .about("Import transactions")
                .subcommand(Command::new("csv").arg(req("path")))
                .subcommand(
                    Command::new("ofx")
                        .about("Import a bank or card statement, skipping lines already recorded")
                        .arg(req("path"))
                        .arg(opt("account")),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export transactions")
                .subcommand(
                    Command::new("transactions")
                        .arg(opt("format").default_value("csv").value_parser(["csv", "json"]))
                        .arg(req("out"))
                        .arg(opt("month")),
                ),
        )
        .subcommand(Command::new("doctor").about("Check reconciliation links"))
}
