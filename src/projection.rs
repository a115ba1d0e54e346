// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Expands recurring templates into `prevista` transactions, one per
//! (template, month).

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::{CoreError, CoreResult, StorageContext, is_unique_violation};
use crate::models::{EntryMode, Period, RecurringTemplate, Status, Transaction};
use crate::store;

/// Id of any row already generated from or realizing `template_id` in `period`.
fn existing_in_period(
    conn: &Connection,
    template_id: i64,
    period: Period,
) -> CoreResult<Option<i64>> {
    conn.query_row(
        "SELECT id FROM transacoes
         WHERE recorrente_id=?1 AND (competencia=?2 OR (data>=?3 AND data<=?4))
         LIMIT 1",
        params![
            template_id,
            period,
            period.first_day(),
            period.last_day()
        ],
        |r| r.get(0),
    )
    .optional()
    .storage("transacoes")
}

/// Generates the projected transaction of `template` for `period`.
///
/// Fails with [`CoreError::DuplicateProjection`] when a row for the pair
/// already exists, whether it is still projected, realized or replaced, and
/// when a concurrent writer won the race on the unique index.
pub fn project(
    conn: &Connection,
    template: &RecurringTemplate,
    period: Period,
) -> CoreResult<Transaction> {
    if !template.ativo {
        return Err(CoreError::validation(format!(
            "template {} is inactive",
            template.id
        )));
    }
    store::ensure_day("day of month", template.dia_do_mes)?;

    if existing_in_period(conn, template.id, period)?.is_some() {
        return Err(CoreError::DuplicateProjection {
            template_id: template.id,
            period,
        });
    }

    let data = period.clamped_day(template.dia_do_mes);
    let inserted = conn.execute(
        "INSERT INTO transacoes(user_id, conta_id, categoria_id, descricao, valor, tipo, data,
                                status, modo_lancamento, recorrente_id, competencia)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            template.user_id,
            template.conta_id,
            template.categoria_id,
            template.descricao,
            template.valor.to_string(),
            template.tipo,
            data,
            Status::Projected,
            EntryMode::Automatic,
            template.id,
            period
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(template = template.id, %period, "lost projection race");
            return Err(CoreError::DuplicateProjection {
                template_id: template.id,
                period,
            });
        }
        Err(source) => {
            return Err(CoreError::Storage {
                context: format!("projecting template {} into {}", template.id, period),
                source,
            });
        }
    }

    let id = conn.last_insert_rowid();
    tracing::debug!(template = template.id, %period, transaction = id, "projected");
    Ok(Transaction {
        id,
        user_id: template.user_id,
        conta_id: template.conta_id,
        categoria_id: template.categoria_id,
        descricao: template.descricao.clone(),
        valor: template.valor,
        tipo: template.tipo,
        data,
        status: Status::Projected,
        modo_lancamento: EntryMode::Automatic,
        recorrente_id: Some(template.id),
        transacao_prevista_id: None,
        observacao: None,
        id_externo: None,
    })
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ProjectionReport {
    pub created: Vec<Transaction>,
    pub skipped: usize,
}

/// Projects every active template of `owner` into `period`. Pairs that
/// already have a row count as skipped.
pub fn project_period(conn: &Connection, owner: i64, period: Period) -> CoreResult<ProjectionReport> {
    let mut report = ProjectionReport::default();
    for template in store::list_templates(conn, owner, false)? {
        match project(conn, &template, period) {
            Ok(tx) => report.created.push(tx),
            Err(e) if e.is_duplicate_projection() => report.skipped += 1,
            Err(e) => return Err(e),
        }
    }
    tracing::info!(
        owner,
        %period,
        created = report.created.len(),
        skipped = report.skipped,
        "projection pass"
    );
    Ok(report)
}

/// Runs [`project_period`] for `months` consecutive periods from `start`.
pub fn project_months(
    conn: &Connection,
    owner: i64,
    start: Period,
    months: u32,
) -> CoreResult<ProjectionReport> {
    let mut total = ProjectionReport::default();
    for period in start.span(months)? {
        let report = project_period(conn, owner, period)?;
        total.created.extend(report.created);
        total.skipped += report.skipped;
    }
    Ok(total)
}

/// Projected rows dated before `before` that were never matched.
pub fn stale_projections(
    conn: &Connection,
    owner: i64,
    before: Period,
) -> CoreResult<Vec<Transaction>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM transacoes WHERE user_id=?1 AND status='prevista' AND data<?2
             ORDER BY data, id",
            Transaction::COLUMNS
        ))
        .storage("transacoes")?;
    let rows = stmt
        .query_map(params![owner, before.first_day()], Transaction::from_row)
        .storage("transacoes")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("transacoes")
}
