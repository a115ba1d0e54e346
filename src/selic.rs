// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Selic target rate and the projected value of investments indexed to it.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::ledger::{self, AsOf};
use crate::models::decimal_at;

/// BCB SGS series of the Selic target, in % a.a.
pub const SGS_SERIES: u32 = 1178;

pub fn sgs_url(series: u32) -> String {
    format!(
        "https://api.bcb.gov.br/dados/serie/bcdata.sgs.{}/dados/ultimos/1?formato=json",
        series
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelicRate {
    pub data: NaiveDate,
    /// Percent per year.
    pub valor_aa: Decimal,
}

#[derive(Debug, Deserialize)]
struct SgsPoint {
    data: String,
    valor: String,
}

/// Latest point of an SGS response: `[{"data": "dd/mm/yyyy", "valor": "x.xx"}]`.
pub fn parse_sgs(body: &str) -> CoreResult<SelicRate> {
    let points: Vec<SgsPoint> = serde_json::from_str(body)?;
    let last = points
        .last()
        .ok_or_else(|| CoreError::validation("SGS response has no points"))?;
    let data = NaiveDate::parse_from_str(last.data.trim(), "%d/%m/%Y")
        .map_err(|_| CoreError::validation(format!("bad SGS date '{}'", last.data)))?;
    let valor_aa = last
        .valor
        .trim()
        .replace(',', ".")
        .parse::<Decimal>()
        .map_err(|_| CoreError::validation(format!("bad SGS value '{}'", last.valor)))?;
    Ok(SelicRate { data, valor_aa })
}

/// Stores the rate published on `rate.data`, replacing an earlier fetch of
/// the same date.
pub fn save_rate(conn: &Connection, rate: &SelicRate) -> CoreResult<()> {
    if rate.valor_aa < Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "Selic rate must not be negative (got {})",
            rate.valor_aa
        )));
    }
    conn.execute(
        "INSERT INTO taxas_selic(data, valor_aa) VALUES (?1, ?2)
         ON CONFLICT(data) DO UPDATE SET valor_aa=excluded.valor_aa, obtido_em=datetime('now')",
        params![rate.data, rate.valor_aa.to_string()],
    )
    .storage("taxas_selic")?;
    Ok(())
}

pub fn latest_rate(conn: &Connection) -> CoreResult<Option<SelicRate>> {
    conn.query_row(
        "SELECT data, valor_aa FROM taxas_selic ORDER BY data DESC LIMIT 1",
        [],
        |r| {
            Ok(SelicRate {
                data: r.get(0)?,
                valor_aa: decimal_at(r, 1)?,
            })
        },
    )
    .optional()
    .storage("taxas_selic")
}

/// Value after `days` of an investment paying `percent_of_selic`% of a Selic
/// rate of `selic_aa`% a.a.:
/// `principal * (1 + ((1 + selic)^(days/365) - 1) * percent/100)`,
/// rounded to cents.
pub fn projected_value(
    principal: Decimal,
    selic_aa: Decimal,
    days: i64,
    percent_of_selic: Decimal,
) -> CoreResult<Decimal> {
    if principal <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    if days <= 0 {
        return Ok(principal);
    }
    if selic_aa < Decimal::ZERO || percent_of_selic < Decimal::ZERO {
        return Err(CoreError::validation(
            "Selic rate and percentage must not be negative",
        ));
    }
    let rate = (selic_aa / Decimal::ONE_HUNDRED)
        .to_f64()
        .ok_or_else(|| CoreError::validation("Selic rate out of range"))?;
    let share = (percent_of_selic / Decimal::ONE_HUNDRED)
        .to_f64()
        .ok_or_else(|| CoreError::validation("percentage out of range"))?;
    let factor = (1.0 + rate).powf(days as f64 / 365.0);
    let adjusted = Decimal::from_f64_retain(1.0 + (factor - 1.0) * share)
        .ok_or_else(|| CoreError::validation("projected value out of range"))?;
    principal
        .checked_mul(adjusted)
        .map(|v| v.round_dp(2))
        .ok_or_else(|| CoreError::validation("projected value out of range"))
}

#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub principal: Decimal,
    pub selic_aa: Decimal,
    pub percent_of_selic: Decimal,
    pub from: NaiveDate,
    pub days: i64,
    pub value: Decimal,
}

/// Rate to use when the caller did not give one: the latest stored.
pub fn rate_or_latest(conn: &Connection, selic_aa: Option<Decimal>) -> CoreResult<Decimal> {
    match selic_aa {
        Some(r) => Ok(r),
        None => latest_rate(conn)?
            .map(|r| r.valor_aa)
            .ok_or_else(|| CoreError::validation("no Selic rate stored; fetch or set one first")),
    }
}

/// Projects the currently believed balance of an investment on `from`
/// forward by `days`.
pub fn estimate_investment(
    conn: &Connection,
    owner: i64,
    investment_id: i64,
    from: NaiveDate,
    days: i64,
    percent_of_selic: Decimal,
    selic_aa: Option<Decimal>,
) -> CoreResult<Estimate> {
    let principal = ledger::value_on(conn, owner, investment_id, from, AsOf::Now)?
        .map(|p| p.saldo)
        .ok_or_else(|| {
            CoreError::validation(format!(
                "no balance known for investment {} on {}",
                investment_id, from
            ))
        })?;
    let selic_aa = rate_or_latest(conn, selic_aa)?;
    Ok(Estimate {
        principal,
        selic_aa,
        percent_of_selic,
        from,
        days,
        value: projected_value(principal, selic_aa, days, percent_of_selic)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn one_year_at_full_selic_grows_by_the_rate() {
        let v = projected_value(d("1000"), d("10"), 365, d("100")).unwrap();
        assert_eq!(v, d("1100.00"));
        let half = projected_value(d("1000"), d("10"), 365, d("50")).unwrap();
        assert_eq!(half, d("1050.00"));
    }

    #[test]
    fn partial_years_compound() {
        // 1.1^(730/365) = 1.21
        assert_eq!(projected_value(d("100"), d("10"), 730, d("100")).unwrap(), d("121.00"));
        let month = projected_value(d("1000"), d("10.5"), 30, d("100")).unwrap();
        assert!(month > d("1008") && month < d("1009"));
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(projected_value(d("0"), d("10"), 30, d("100")).unwrap(), Decimal::ZERO);
        assert_eq!(projected_value(d("500"), d("10"), 0, d("100")).unwrap(), d("500"));
        assert!(projected_value(d("500"), d("-1"), 30, d("100")).is_err());
    }

    #[test]
    fn reads_the_last_sgs_point() {
        let body = r#"[{"data":"18/09/2025","valor":"15.00"},{"data":"05/11/2025","valor":"14,75"}]"#;
        let rate = parse_sgs(body).unwrap();
        assert_eq!(rate.data, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
        assert_eq!(rate.valor_aa, d("14.75"));
        assert!(parse_sgs("[]").is_err());
        assert!(matches!(parse_sgs("<html>"), Err(CoreError::Payload(_))));
    }
}
