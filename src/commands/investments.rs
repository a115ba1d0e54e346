// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{self, AsOf};
use crate::models::{BalancePoint, KNOWN_AT_FORMAT};
use crate::selic::{self, SelicRate};
use crate::utils::{
    arg, fmt_money, get_currency, http_client, id_for_investment, maybe_print_json, opt_arg,
    parse_date, parse_decimal, parse_known_at, parse_period, pretty_table,
};
use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let inv = ledger::create_investment(conn, owner, arg(sub, "name")?)?;
            println!("Added investment '{}' (id {})", inv.nome, inv.id);
        }
        Some(("list", sub)) => {
            let invs = ledger::list_investments(conn, owner, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &invs)? {
                let data = invs
                    .iter()
                    .map(|i| vec![i.id.to_string(), i.nome.clone(), i.ativo.to_string()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name", "Active"], data));
            }
        }
        Some(("rm", sub)) => {
            let name = arg(sub, "name")?;
            ledger::deactivate_investment(conn, owner, id_for_investment(conn, owner, name)?)?;
            println!("Deactivated investment '{}'; its history is kept", name);
        }
        Some(("record", sub)) => record(conn, owner, sub)?,
        Some(("show", sub)) => show(conn, owner, sub)?,
        Some(("series", sub)) => series(conn, owner, sub)?,
        Some(("chart", sub)) => chart(conn, owner, sub)?,
        Some(("total", sub)) => {
            let date = parse_date(arg(sub, "date")?)?;
            let total = ledger::total_on(conn, owner, date, as_of(sub)?)?;
            println!("Invested on {}: {}", date, fmt_money(&total, &get_currency(conn)?));
        }
        Some(("selic", sub)) => selic_cmd(conn, owner, sub)?,
        Some(("history", sub)) => {
            let id = id_for_investment(conn, owner, arg(sub, "name")?)?;
            let date = parse_date(arg(sub, "date")?)?;
            let points = ledger::history(conn, owner, id, date)?;
            print_points(sub, &points)?;
        }
        _ => {}
    }
    Ok(())
}

fn as_of(sub: &clap::ArgMatches) -> Result<AsOf> {
    Ok(match opt_arg(sub, "as_of") {
        Some(ts) => AsOf::At(parse_known_at(ts)?),
        None => AsOf::Now,
    })
}

fn print_points(sub: &clap::ArgMatches, points: &[BalancePoint]) -> Result<()> {
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &points)? {
        let data = points
            .iter()
            .map(|p| {
                vec![
                    p.data_referencia.to_string(),
                    p.saldo.to_string(),
                    p.data_conhecido_em.format(KNOWN_AT_FORMAT).to_string(),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Reference", "Balance", "Known at"], data));
    }
    Ok(())
}

fn record(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let name = arg(sub, "name")?;
    let id = id_for_investment(conn, owner, name)?;
    let reference = parse_date(arg(sub, "date")?)?;
    let balance = parse_decimal(arg(sub, "balance")?)?;
    let known_at = opt_arg(sub, "known_at").map(parse_known_at).transpose()?;
    let point = ledger::record_balance(conn, owner, id, reference, balance, known_at)?;
    println!(
        "Recorded {} = {} for {} (known at {})",
        name,
        point.saldo,
        point.data_referencia,
        point.data_conhecido_em.format(KNOWN_AT_FORMAT)
    );
    Ok(())
}

fn show(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let name = arg(sub, "name")?;
    let id = id_for_investment(conn, owner, name)?;
    let date = parse_date(arg(sub, "date")?)?;
    match ledger::belief(conn, owner, id, date, as_of(sub)?)? {
        Some(p) => println!(
            "{} on {}: {} (known at {})",
            name,
            date,
            p.saldo,
            p.data_conhecido_em.format(KNOWN_AT_FORMAT)
        ),
        None => println!("No balance known for {} on {}", name, date),
    }
    Ok(())
}

fn series(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let id = id_for_investment(conn, owner, arg(sub, "name")?)?;
    let from = parse_date(arg(sub, "from")?)?;
    let to = parse_date(arg(sub, "to")?)?;
    let points = ledger::series(conn, owner, id, from, to, as_of(sub)?)?;
    print_points(sub, &points)
}

fn chart(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let id = id_for_investment(conn, owner, arg(sub, "name")?)?;
    let start = parse_period(arg(sub, "from")?)?;
    let months_raw = arg(sub, "months")?;
    let months = months_raw
        .parse::<u32>()
        .with_context(|| format!("Invalid month count '{}'", months_raw))?;
    let points = ledger::monthly_chart(conn, owner, id, start, months, as_of(sub)?)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &points)? {
        let data = points
            .iter()
            .map(|p| {
                vec![
                    p.period.to_string(),
                    p.value.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Month", "Balance"], data));
    }
    Ok(())
}

fn selic_cmd(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("fetch", _)) => {
            let rate = fetch_selic()?;
            selic::save_rate(conn, &rate)?;
            println!("Selic {}% a.a. published {} (BCB SGS {})", rate.valor_aa, rate.data, selic::SGS_SERIES);
        }
        Some(("set", sub)) => {
            let data = match opt_arg(sub, "date") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let rate = SelicRate {
                data,
                valor_aa: parse_decimal(arg(sub, "rate")?)?,
            };
            selic::save_rate(conn, &rate)?;
            println!("Selic set to {}% a.a. from {}", rate.valor_aa, rate.data);
        }
        Some(("show", _)) => match selic::latest_rate(conn)? {
            Some(r) => println!("Selic {}% a.a. (published {})", r.valor_aa, r.data),
            None => println!("No Selic rate stored; run `invest selic fetch`"),
        },
        Some(("estimate", sub)) => {
            let days_raw = arg(sub, "days")?;
            let days = days_raw
                .parse::<i64>()
                .with_context(|| format!("Invalid day count '{}'", days_raw))?;
            let percent = parse_decimal(arg(sub, "percent")?)?;
            let rate = opt_arg(sub, "rate").map(parse_decimal).transpose()?;
            let on = match opt_arg(sub, "on") {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let ccy = get_currency(conn)?;
            let (principal, value) = match opt_arg(sub, "name") {
                Some(name) => {
                    let id = id_for_investment(conn, owner, name)?;
                    let e = selic::estimate_investment(conn, owner, id, on, days, percent, rate)?;
                    (e.principal, e.value)
                }
                None => {
                    let principal = parse_decimal(
                        opt_arg(sub, "principal").context("Give --name or --principal")?,
                    )?;
                    let rate = selic::rate_or_latest(conn, rate)?;
                    (principal, selic::projected_value(principal, rate, days, percent)?)
                }
            };
            println!(
                "{} at {}% of Selic for {} day(s): {}",
                fmt_money(&principal, &ccy),
                percent,
                days,
                fmt_money(&value, &ccy)
            );
        }
        _ => {}
    }
    Ok(())
}

fn fetch_selic() -> Result<SelicRate> {
    let url = selic::sgs_url(selic::SGS_SERIES);
    let client = http_client()?;
    let body = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()?
        .error_for_status()?
        .text()?;
    selic::parse_sgs(&body).context("Unexpected SGS response")
}
