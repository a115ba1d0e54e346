// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bitemporal investment balances.
//!
//! A balance point is identified by (investment, reference date, knowledge
//! timestamp). Corrections add rows instead of overwriting, and every read
//! takes an [`AsOf`] to say which knowledge it may use.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, StorageContext, is_unique_violation};
use crate::models::{BalancePoint, Investment, KNOWN_AT_FORMAT, Period, decimal_at, timestamp_at};
use crate::store::owned_row_exists;

/// Knowledge cut-off for a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AsOf {
    /// Everything recorded so far.
    #[default]
    Now,
    At(NaiveDateTime),
}

impl AsOf {
    pub fn resolve(self) -> NaiveDateTime {
        match self {
            AsOf::Now => now(),
            AsOf::At(ts) => ts,
        }
    }

    fn key(self) -> String {
        self.resolve().format(KNOWN_AT_FORMAT).to_string()
    }
}

fn now() -> NaiveDateTime {
    truncate(Local::now().naive_local())
}

fn truncate(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

// ---- investments ----

fn investment_from_row(r: &Row<'_>) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: r.get(0)?,
        user_id: r.get(1)?,
        nome: r.get(2)?,
        ativo: r.get(3)?,
    })
}

pub fn create_investment(conn: &Connection, owner: i64, nome: &str) -> CoreResult<Investment> {
    let nome = nome.trim();
    if nome.is_empty() {
        return Err(CoreError::validation("investment name must not be blank"));
    }
    conn.execute(
        "INSERT INTO investimentos(user_id, nome) VALUES (?1, ?2)",
        params![owner, nome],
    )
    .storage("investimentos (name must be unique)")?;
    Ok(Investment {
        id: conn.last_insert_rowid(),
        user_id: owner,
        nome: nome.to_string(),
        ativo: true,
    })
}

pub fn find_investment(conn: &Connection, owner: i64, nome: &str) -> CoreResult<Option<Investment>> {
    conn.query_row(
        "SELECT id, user_id, nome, ativo FROM investimentos WHERE user_id=?1 AND nome=?2",
        params![owner, nome.trim()],
        investment_from_row,
    )
    .optional()
    .storage("investimentos")
}

pub fn list_investments(
    conn: &Connection,
    owner: i64,
    include_inactive: bool,
) -> CoreResult<Vec<Investment>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, nome, ativo FROM investimentos
             WHERE user_id=?1 AND (?2 OR ativo=1) ORDER BY nome",
        )
        .storage("investimentos")?;
    let rows = stmt
        .query_map(params![owner, include_inactive], investment_from_row)
        .storage("investimentos")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("investimentos")
}

pub fn deactivate_investment(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    let n = conn
        .execute(
            "UPDATE investimentos SET ativo=0 WHERE id=?1 AND user_id=?2",
            params![id, owner],
        )
        .storage("investimentos")?;
    if n == 0 {
        return Err(CoreError::NotFound {
            entity: "investment",
            id,
        });
    }
    Ok(())
}

// ---- balance points ----

fn point_from_row(r: &Row<'_>) -> rusqlite::Result<BalancePoint> {
    Ok(BalancePoint {
        id: r.get(0)?,
        investimento_id: r.get(1)?,
        data_referencia: r.get(2)?,
        data_conhecido_em: timestamp_at(r, 3)?,
        saldo: decimal_at(r, 4)?,
    })
}

/// Records what the balance of `reference` is believed to be, as known at
/// `known_at` (default: now). Never overwrites an earlier belief.
pub fn record_balance(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    reference: NaiveDate,
    saldo: Decimal,
    known_at: Option<NaiveDateTime>,
) -> CoreResult<BalancePoint> {
    if saldo < Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "balance must not be negative (got {})",
            saldo
        )));
    }
    if !owned_row_exists(conn, "investimentos", owner, investment_id)? {
        return Err(CoreError::NotFound {
            entity: "investment",
            id: investment_id,
        });
    }
    let known = known_at.map(truncate).unwrap_or_else(now);
    let inserted = conn.execute(
        "INSERT INTO investimentos_saldos(user_id, investimento_id, data_referencia, data_conhecido_em, saldo)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            owner,
            investment_id,
            reference,
            known.format(KNOWN_AT_FORMAT).to_string(),
            saldo.to_string()
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(CoreError::ConflictingKnowledge {
                investment_id,
                reference,
                known_at: known,
            });
        }
        Err(source) => {
            return Err(CoreError::Storage {
                context: format!("recording balance of investment {}", investment_id),
                source,
            });
        }
    }
    tracing::debug!(investment = investment_id, %reference, %known, "balance recorded");
    Ok(BalancePoint {
        id: conn.last_insert_rowid(),
        investimento_id: investment_id,
        data_referencia: reference,
        data_conhecido_em: known,
        saldo,
    })
}

/// The belief about `reference` held at `as_of`: among the points for that
/// exact reference date, the one with the latest knowledge not after `as_of`.
pub fn belief(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    reference: NaiveDate,
    as_of: AsOf,
) -> CoreResult<Option<BalancePoint>> {
    conn.query_row(
        "SELECT id, investimento_id, data_referencia, data_conhecido_em, saldo
         FROM investimentos_saldos
         WHERE user_id=?1 AND investimento_id=?2 AND data_referencia=?3 AND data_conhecido_em<=?4
         ORDER BY data_conhecido_em DESC, id DESC LIMIT 1",
        params![owner, investment_id, reference, as_of.key()],
        point_from_row,
    )
    .optional()
    .storage("investimentos_saldos")
}

/// Latest belief per reference date within [from, to], ordered by reference.
fn beliefs(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    from: Option<NaiveDate>,
    to: NaiveDate,
    as_of: AsOf,
) -> CoreResult<Vec<BalancePoint>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, investimento_id, data_referencia, data_conhecido_em, saldo FROM (
                 SELECT id, investimento_id, data_referencia, data_conhecido_em, saldo,
                        ROW_NUMBER() OVER (
                            PARTITION BY data_referencia
                            ORDER BY data_conhecido_em DESC, id DESC
                        ) AS rn
                 FROM investimentos_saldos
                 WHERE user_id=?1 AND investimento_id=?2
                   AND (?3 IS NULL OR data_referencia>=?3) AND data_referencia<=?4
                   AND data_conhecido_em<=?5
             ) WHERE rn = 1
             ORDER BY data_referencia",
        )
        .storage("investimentos_saldos")?;
    let rows = stmt
        .query_map(
            params![owner, investment_id, from, to, as_of.key()],
            point_from_row,
        )
        .storage("investimentos_saldos")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("investimentos_saldos")
}

/// Time series for charting: one point per reference date in range that has a
/// belief at `as_of`. Dates without one are absent, never interpolated.
pub fn series(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    as_of: AsOf,
) -> CoreResult<Vec<BalancePoint>> {
    if from > to {
        return Err(CoreError::validation(format!(
            "range start {} is after its end {}",
            from, to
        )));
    }
    beliefs(conn, owner, investment_id, Some(from), to, as_of)
}

/// Last known value on `date`: the belief for the latest reference date not
/// after `date`.
pub fn value_on(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    date: NaiveDate,
    as_of: AsOf,
) -> CoreResult<Option<BalancePoint>> {
    Ok(beliefs(conn, owner, investment_id, None, date, as_of)?.pop())
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub period: Period,
    pub date: NaiveDate,
    pub value: Option<Decimal>,
}

/// Month-end values for `months` periods from `start`, carrying the last
/// known value forward across gaps.
pub fn monthly_chart(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    start: Period,
    months: u32,
    as_of: AsOf,
) -> CoreResult<Vec<ChartPoint>> {
    let periods = start.span(months)?;
    let Some(last) = periods.last() else {
        return Ok(Vec::new());
    };
    let known = beliefs(conn, owner, investment_id, None, last.last_day(), as_of)?;

    let mut out = Vec::with_capacity(periods.len());
    let mut idx = 0;
    let mut carried: Option<Decimal> = None;
    for period in periods {
        let date = period.last_day();
        while idx < known.len() && known[idx].data_referencia <= date {
            carried = Some(known[idx].saldo);
            idx += 1;
        }
        out.push(ChartPoint {
            period,
            date,
            value: carried,
        });
    }
    Ok(out)
}

/// Sum of the last known values of all active investments on `date`.
pub fn total_on(conn: &Connection, owner: i64, date: NaiveDate, as_of: AsOf) -> CoreResult<Decimal> {
    let mut total = Decimal::ZERO;
    for inv in list_investments(conn, owner, false)? {
        if let Some(point) = value_on(conn, owner, inv.id, date, as_of)? {
            total += point.saldo;
        }
    }
    Ok(total)
}

/// Every belief ever recorded for one reference date, oldest knowledge first.
pub fn history(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    reference: NaiveDate,
) -> CoreResult<Vec<BalancePoint>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, investimento_id, data_referencia, data_conhecido_em, saldo
             FROM investimentos_saldos
             WHERE user_id=?1 AND investimento_id=?2 AND data_referencia=?3
             ORDER BY data_conhecido_em, id",
        )
        .storage("investimentos_saldos")?;
    let rows = stmt
        .query_map(params![owner, investment_id, reference], point_from_row)
        .storage("investimentos_saldos")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("investimentos_saldos")
}
