// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Budget and goal rollups, recomputed from the transaction set on every read.
//!
//! Realized and projected amounts are kept apart; `substituida` rows are never
//! read, since their replacement already carries the amount.

use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::models::{Budget, BudgetNature, Kind, Period, Status, decimal_at};
use crate::store::{self, ensure_positive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Ok,
    Warning,
    Exceeded,
}

impl Tier {
    /// Below 80% is ok, 80% up to and including 100% is a warning, above is
    /// exceeded. A zero limit is exceeded by any consumption.
    pub fn classify(consumed: Decimal, limit: Decimal) -> Tier {
        if limit <= Decimal::ZERO {
            return if consumed > Decimal::ZERO {
                Tier::Exceeded
            } else {
                Tier::Ok
            };
        }
        if consumed > limit {
            Tier::Exceeded
        } else if consumed * Decimal::from(10) >= limit * Decimal::from(8) {
            Tier::Warning
        } else {
            Tier::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Ok => "ok",
            Tier::Warning => "warning",
            Tier::Exceeded => "exceeded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRollup {
    pub categoria_id: i64,
    pub period: Period,
    pub realized: Decimal,
    pub projected: Decimal,
}

impl CategoryRollup {
    pub fn consumed(&self) -> Decimal {
        self.realized + self.projected
    }
}

/// Realized and still-projected totals of one category in one month. Only
/// rows whose type matches the category's type are counted.
pub fn rollup(
    conn: &Connection,
    owner: i64,
    categoria_id: i64,
    period: Period,
) -> CoreResult<CategoryRollup> {
    let category = store::get_category(conn, owner, categoria_id)?.ok_or(CoreError::NotFound {
        entity: "category",
        id: categoria_id,
    })?;
    let mut stmt = conn
        .prepare_cached(
            "SELECT valor, status FROM transacoes
             WHERE user_id=?1 AND categoria_id=?2 AND tipo=?3
               AND data>=?4 AND data<=?5
               AND status IN ('realizada','prevista')",
        )
        .storage("transacoes")?;
    let mut rows = stmt
        .query(params![
            owner,
            categoria_id,
            category.tipo,
            period.first_day(),
            period.last_day()
        ])
        .storage("transacoes")?;
    let mut out = CategoryRollup {
        categoria_id,
        period,
        realized: Decimal::ZERO,
        projected: Decimal::ZERO,
    };
    while let Some(r) = rows.next().storage("transacoes")? {
        let valor = decimal_at(r, 0).storage("transacoes.valor")?;
        let status: Status = r.get(1).storage("transacoes.status")?;
        match status {
            Status::Realized => out.realized += valor,
            Status::Projected => out.projected += valor,
            Status::Replaced => {}
        }
    }
    Ok(out)
}

// ---- budgets ----

const BUDGET_COLUMNS: &str =
    "id, user_id, categoria_id, valor_limite, periodo, natureza, ativo";

fn budget_from_row(r: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: r.get(0)?,
        user_id: r.get(1)?,
        categoria_id: r.get(2)?,
        valor_limite: decimal_at(r, 3)?,
        periodo: r.get(4)?,
        natureza: r.get(5)?,
        ativo: r.get(6)?,
    })
}

/// Creates or updates the budget of a category. A soft-deleted budget for the
/// same category is reactivated rather than duplicated.
pub fn set_budget(
    conn: &Connection,
    owner: i64,
    categoria_id: i64,
    limite: Decimal,
    natureza: BudgetNature,
) -> CoreResult<Budget> {
    ensure_positive("budget limit", limite)?;
    if !store::owned_row_exists(conn, "categorias", owner, categoria_id)? {
        return Err(CoreError::NotFound {
            entity: "category",
            id: categoria_id,
        });
    }
    conn.execute(
        "INSERT INTO orcamentos(user_id, categoria_id, valor_limite, natureza) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, categoria_id) DO UPDATE
         SET valor_limite=excluded.valor_limite, natureza=excluded.natureza, ativo=1",
        params![owner, categoria_id, limite.to_string(), natureza],
    )
    .storage("orcamentos")?;
    conn.query_row(
        &format!(
            "SELECT {} FROM orcamentos WHERE user_id=?1 AND categoria_id=?2",
            BUDGET_COLUMNS
        ),
        params![owner, categoria_id],
        budget_from_row,
    )
    .storage("orcamentos")
}

pub fn list_budgets(
    conn: &Connection,
    owner: i64,
    natureza: Option<BudgetNature>,
    include_inactive: bool,
) -> CoreResult<Vec<Budget>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM orcamentos
             WHERE user_id=?1 AND (?2 IS NULL OR natureza=?2) AND (?3 OR ativo=1)
             ORDER BY id",
            BUDGET_COLUMNS
        ))
        .storage("orcamentos")?;
    let rows = stmt
        .query_map(params![owner, natureza, include_inactive], budget_from_row)
        .storage("orcamentos")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("orcamentos")
}

pub fn deactivate_budget(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    let n = conn
        .execute(
            "UPDATE orcamentos SET ativo=0 WHERE id=?1 AND user_id=?2",
            params![id, owner],
        )
        .storage("orcamentos")?;
    if n == 0 {
        return Err(CoreError::NotFound {
            entity: "budget",
            id,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub budget_id: i64,
    pub categoria_id: i64,
    pub categoria: String,
    pub period: Period,
    pub limite: Decimal,
    pub realizado: Decimal,
    pub previsto: Decimal,
    pub consumido: Decimal,
    pub restante: Decimal,
    pub tier: Tier,
}

/// Spending limits of the period, one row per active `teto` budget.
pub fn budget_status(conn: &Connection, owner: i64, period: Period) -> CoreResult<Vec<BudgetStatus>> {
    let mut out = Vec::new();
    for budget in list_budgets(conn, owner, Some(BudgetNature::Limit), false)? {
        let Some(category) = store::get_category(conn, owner, budget.categoria_id)? else {
            continue;
        };
        let r = rollup(conn, owner, budget.categoria_id, period)?;
        let consumido = r.consumed();
        out.push(BudgetStatus {
            budget_id: budget.id,
            categoria_id: budget.categoria_id,
            categoria: category.nome,
            period,
            limite: budget.valor_limite,
            realizado: r.realized,
            previsto: r.projected,
            consumido,
            restante: budget.valor_limite - consumido,
            tier: Tier::classify(consumido, budget.valor_limite),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub budget_id: i64,
    pub categoria_id: i64,
    pub categoria: String,
    pub period: Period,
    pub alvo: Decimal,
    pub progresso: Decimal,
    /// progress / target, rounded to 4 places
    pub ratio: Decimal,
    pub atingida: bool,
}

/// Savings targets of the period. Consumption reads as progress here.
pub fn goal_progress(conn: &Connection, owner: i64, period: Period) -> CoreResult<Vec<GoalProgress>> {
    let mut out = Vec::new();
    for goal in list_budgets(conn, owner, Some(BudgetNature::Goal), false)? {
        let Some(category) = store::get_category(conn, owner, goal.categoria_id)? else {
            continue;
        };
        let progresso = rollup(conn, owner, goal.categoria_id, period)?.consumed();
        let ratio = if goal.valor_limite > Decimal::ZERO {
            (progresso / goal.valor_limite).round_dp(4)
        } else {
            Decimal::ZERO
        };
        out.push(GoalProgress {
            budget_id: goal.id,
            categoria_id: goal.categoria_id,
            categoria: category.nome,
            period,
            alvo: goal.valor_limite,
            progresso,
            ratio,
            atingida: progresso >= goal.valor_limite,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodTotals {
    pub receitas: Decimal,
    pub despesas: Decimal,
    pub saldo: Decimal,
    pub receitas_previstas: Decimal,
    pub despesas_previstas: Decimal,
}

/// Realized cash flow of the month, with outstanding projections reported
/// separately as a forecast signal.
pub fn period_totals(conn: &Connection, owner: i64, period: Period) -> CoreResult<PeriodTotals> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT valor, tipo, status FROM transacoes
             WHERE user_id=?1 AND data>=?2 AND data<=?3 AND status IN ('realizada','prevista')",
        )
        .storage("transacoes")?;
    let mut rows = stmt
        .query(params![owner, period.first_day(), period.last_day()])
        .storage("transacoes")?;
    let mut t = PeriodTotals::default();
    while let Some(r) = rows.next().storage("transacoes")? {
        let valor = decimal_at(r, 0).storage("transacoes.valor")?;
        let tipo: Kind = r.get(1).storage("transacoes.tipo")?;
        let status: Status = r.get(2).storage("transacoes.status")?;
        match (status, tipo) {
            (Status::Realized, Kind::Income) => t.receitas += valor,
            (Status::Realized, Kind::Expense) => t.despesas += valor,
            (Status::Projected, Kind::Income) => t.receitas_previstas += valor,
            (Status::Projected, Kind::Expense) => t.despesas_previstas += valor,
            (Status::Replaced, _) => {}
        }
    }
    t.saldo = t.receitas - t.despesas;
    Ok(t)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub categoria: String,
    pub tipo: Kind,
    pub total: Decimal,
    pub quantidade: usize,
}

/// Realized totals per category and type for the month, largest first.
pub fn category_summary(
    conn: &Connection,
    owner: i64,
    period: Period,
) -> CoreResult<Vec<CategorySummary>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT COALESCE(c.nome, '(sem categoria)'), t.tipo, t.valor
             FROM transacoes t LEFT JOIN categorias c ON t.categoria_id=c.id
             WHERE t.user_id=?1 AND t.status='realizada' AND t.data>=?2 AND t.data<=?3",
        )
        .storage("transacoes")?;
    let mut rows = stmt
        .query(params![owner, period.first_day(), period.last_day()])
        .storage("transacoes")?;
    let mut agg: BTreeMap<(String, &'static str), (Kind, Decimal, usize)> = BTreeMap::new();
    while let Some(r) = rows.next().storage("transacoes")? {
        let nome: String = r.get(0).storage("categorias.nome")?;
        let tipo: Kind = r.get(1).storage("transacoes.tipo")?;
        let valor = decimal_at(r, 2).storage("transacoes.valor")?;
        let entry = agg
            .entry((nome, tipo.as_str()))
            .or_insert((tipo, Decimal::ZERO, 0));
        entry.1 += valor;
        entry.2 += 1;
    }
    let mut out: Vec<CategorySummary> = agg
        .into_iter()
        .map(|((categoria, _), (tipo, total, quantidade))| CategorySummary {
            categoria,
            tipo,
            total,
            quantidade,
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total));
    Ok(out)
}
