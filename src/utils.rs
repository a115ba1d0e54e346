// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::models::{KNOWN_AT_FORMAT, Period};
use crate::{ledger, store};

const UA: &str = concat!("caderneta/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_period(s: &str) -> Result<Period> {
    s.parse::<Period>()
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))
}

/// Knowledge timestamps: "YYYY-MM-DD HH:MM:SS", "YYYY-MM-DDTHH:MM:SS", or a
/// bare date meaning its midnight.
pub fn parse_known_at(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, KNOWN_AT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN)).map_err(|_| ()))
        .map_err(|_| anyhow::anyhow!("Invalid timestamp '{}', expected YYYY-MM-DD[ HH:MM:SS]", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {}", ccy, d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

pub fn opt_id(id: Option<i64>) -> String {
    id.map(|i| i.to_string()).unwrap_or_default()
}

// Lookups accept a name or a numeric id.

pub fn id_for_account(conn: &Connection, owner: i64, name: &str) -> Result<i64> {
    let name = name.trim();
    if let Some(a) = store::find_account(conn, owner, name)? {
        return Ok(a.id);
    }
    match name.parse::<i64>() {
        Ok(id) if store::get_account(conn, owner, id)?.is_some() => Ok(id),
        _ => anyhow::bail!("Account '{}' not found", name),
    }
}

pub fn id_for_category(conn: &Connection, owner: i64, name: &str) -> Result<i64> {
    let name = name.trim();
    if let Some(c) = store::find_category(conn, owner, name)? {
        return Ok(c.id);
    }
    match name.parse::<i64>() {
        Ok(id) if store::get_category(conn, owner, id)?.is_some() => Ok(id),
        _ => anyhow::bail!("Category '{}' not found", name),
    }
}

pub fn id_for_investment(conn: &Connection, owner: i64, name: &str) -> Result<i64> {
    let name = name.trim();
    if let Some(i) = ledger::find_investment(conn, owner, name)? {
        return Ok(i.id);
    }
    let found = match name.parse::<i64>() {
        Ok(id) => ledger::list_investments(conn, owner, true)?
            .into_iter()
            .find(|i| i.id == id),
        Err(_) => None,
    };
    found
        .map(|i| i.id)
        .with_context(|| format!("Investment '{}' not found", name))
}

// Display currency label
pub fn get_currency(conn: &Connection) -> Result<String> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key='currency'", [], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v.unwrap_or_else(|| "R$".to_string()))
}

pub fn set_currency(conn: &Connection, label: &str) -> Result<()> {
    let label = label.trim();
    if label.is_empty() {
        anyhow::bail!("Currency label must not be blank");
    }
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('currency', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![label],
    )?;
    Ok(())
}

/// Trimmed value of a required argument.
pub fn arg<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.trim())
        .with_context(|| format!("Missing required argument '{}'", name))
}

/// Trimmed value of an optional argument; blank counts as absent.
pub fn opt_arg<'a>(m: &'a clap::ArgMatches, name: &str) -> Option<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn parse_id(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid id '{}'", s))
}
