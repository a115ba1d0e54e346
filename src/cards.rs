// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Credit card billing cycles.

use chrono::{Days, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::models::{Account, AccountKind, Period, decimal_at};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingCycle {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub due: NaiveDate,
}

/// The cycle `today` falls in. Closing and due days past the end of a month
/// land on its last day.
pub fn billing_cycle(today: NaiveDate, closing_day: u32, due_day: u32) -> CoreResult<BillingCycle> {
    store::ensure_day("closing day", closing_day)?;
    store::ensure_day("due day", due_day)?;

    let current = Period::of(today);
    let closing_this_month = current.clamped_day(closing_day);
    let end_period = if today <= closing_this_month {
        current
    } else {
        current.next()
    };
    let end = end_period.clamped_day(closing_day);
    let previous_close = end_period.prev().clamped_day(closing_day);
    let start = previous_close
        .checked_add_days(Days::new(1))
        .ok_or_else(|| CoreError::validation("cycle start out of range"))?;

    let due_period = if due_day > closing_day {
        end_period
    } else {
        end_period.next()
    };
    Ok(BillingCycle {
        start,
        end,
        due: due_period.clamped_day(due_day),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub account: Account,
    pub cycle: BillingCycle,
    pub total: Decimal,
    pub transactions: usize,
}

/// Realized expenses charged to the card within the cycle containing `today`.
pub fn statement(conn: &Connection, owner: i64, account_id: i64, today: NaiveDate) -> CoreResult<Statement> {
    let account = store::get_account(conn, owner, account_id)?.ok_or(CoreError::NotFound {
        entity: "account",
        id: account_id,
    })?;
    let (Some(closing), Some(due)) = (account.dia_fechamento, account.dia_vencimento) else {
        return Err(CoreError::validation(format!(
            "account '{}' has no billing days",
            account.nome
        )));
    };
    if account.tipo != AccountKind::CreditCard {
        return Err(CoreError::validation(format!(
            "account '{}' is not a credit card",
            account.nome
        )));
    }
    let cycle = billing_cycle(today, closing, due)?;

    let mut stmt = conn
        .prepare(
            "SELECT valor FROM transacoes
             WHERE user_id=?1 AND conta_id=?2 AND status='realizada' AND tipo='despesa'
               AND data>=?3 AND data<=?4",
        )
        .storage("transacoes")?;
    let rows = stmt
        .query_map(params![owner, account_id, cycle.start, cycle.end], |r| {
            decimal_at(r, 0)
        })
        .storage("transacoes")?;
    let mut total = Decimal::ZERO;
    let mut transactions = 0;
    for valor in rows {
        total += valor.storage("transacoes.valor")?;
        transactions += 1;
    }
    Ok(Statement {
        account,
        cycle,
        total,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn before_closing_ends_this_month() {
        let c = billing_cycle(d(2025, 3, 5), 10, 20).unwrap();
        assert_eq!(c.start, d(2025, 2, 11));
        assert_eq!(c.end, d(2025, 3, 10));
        assert_eq!(c.due, d(2025, 3, 20));
    }

    #[test]
    fn after_closing_rolls_into_next_month_and_year() {
        let c = billing_cycle(d(2025, 12, 15), 10, 5).unwrap();
        assert_eq!(c.start, d(2025, 12, 11));
        assert_eq!(c.end, d(2026, 1, 10));
        // due day not after closing day: following month
        assert_eq!(c.due, d(2026, 2, 5));
    }

    #[test]
    fn clamps_short_months() {
        let c = billing_cycle(d(2025, 2, 20), 31, 31).unwrap();
        assert_eq!(c.start, d(2025, 2, 1));
        assert_eq!(c.end, d(2025, 2, 28));
        assert_eq!(c.due, d(2025, 3, 31));
        assert!(billing_cycle(d(2025, 2, 20), 0, 5).is_err());
    }
}
