// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Transaction lifecycle: recording real transactions, matching them against
//! outstanding projections, editing, and undoing a reconciliation on delete.
//!
//! A projected row moves `prevista` -> `substituida` only together with the
//! insertion of its `realizada` replacement; both happen inside one SQLite
//! transaction. Matching is by template id and period only.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, StorageContext, Warning};
use crate::models::{EntryMode, Kind, Period, Status, Transaction};
use crate::store::{ensure_positive, owned_row_exists};

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub conta_id: Option<i64>,
    pub categoria_id: Option<i64>,
    pub descricao: String,
    pub valor: Decimal,
    pub tipo: Kind,
    pub data: NaiveDate,
    pub modo_lancamento: EntryMode,
    pub recorrente_id: Option<i64>,
    pub observacao: Option<String>,
    pub id_externo: Option<String>,
}

impl NewTransaction {
    pub fn manual(descricao: &str, valor: Decimal, tipo: Kind, data: NaiveDate) -> Self {
        Self {
            conta_id: None,
            categoria_id: None,
            descricao: descricao.to_string(),
            valor,
            tipo,
            data,
            modo_lancamento: EntryMode::Manual,
            recorrente_id: None,
            observacao: None,
            id_externo: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recorded {
    pub transaction: Transaction,
    /// Projection retired by this write, if any.
    pub replaced: Option<i64>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub removed: Transaction,
    /// Projection put back to `prevista` by this delete, if any.
    pub restored: Option<i64>,
}

pub fn get_transaction(conn: &Connection, owner: i64, id: i64) -> CoreResult<Option<Transaction>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM transacoes WHERE id=?1 AND user_id=?2",
            Transaction::COLUMNS
        ),
        params![id, owner],
        Transaction::from_row,
    )
    .optional()
    .storage("transacoes")
}

fn require_transaction(conn: &Connection, owner: i64, id: i64) -> CoreResult<Transaction> {
    get_transaction(conn, owner, id)?.ok_or(CoreError::NotFound {
        entity: "transaction",
        id,
    })
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub period: Option<Period>,
    pub status: Option<Status>,
    pub categoria_id: Option<i64>,
    pub conta_id: Option<i64>,
    pub limit: Option<usize>,
}

pub fn list_transactions(
    conn: &Connection,
    owner: i64,
    filter: &TransactionFilter,
) -> CoreResult<Vec<Transaction>> {
    let (from, to) = match filter.period {
        Some(p) => (Some(p.first_day()), Some(p.last_day())),
        None => (None, None),
    };
    let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM transacoes
             WHERE user_id=?1
               AND (?2 IS NULL OR data>=?2) AND (?3 IS NULL OR data<=?3)
               AND (?4 IS NULL OR status=?4)
               AND (?5 IS NULL OR categoria_id=?5)
               AND (?6 IS NULL OR conta_id=?6)
             ORDER BY data DESC, id DESC
             LIMIT ?7",
            Transaction::COLUMNS
        ))
        .storage("transacoes")?;
    let rows = stmt
        .query_map(
            params![
                owner,
                from,
                to,
                filter.status,
                filter.categoria_id,
                filter.conta_id,
                limit
            ],
            Transaction::from_row,
        )
        .storage("transacoes")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("transacoes")
}

/// Nulls references to categories/accounts that no longer exist.
fn resolve_reference(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    owner: i64,
    id: Option<i64>,
    warnings: &mut Vec<Warning>,
) -> CoreResult<Option<i64>> {
    match id {
        Some(id) if !owned_row_exists(conn, table, owner, id)? => {
            tracing::warn!(entity, id, "reference missing, storing null");
            warnings.push(Warning::ReferentialGap { entity, id });
            Ok(None)
        }
        other => Ok(other),
    }
}

fn validate(new: &NewTransaction) -> CoreResult<()> {
    ensure_positive("amount", new.valor)?;
    if new.descricao.trim().is_empty() {
        return Err(CoreError::validation("description must not be blank"));
    }
    Ok(())
}

fn insert_realized(
    conn: &Connection,
    owner: i64,
    new: &NewTransaction,
    replaces: Option<i64>,
) -> rusqlite::Result<Transaction> {
    conn.execute(
        "INSERT INTO transacoes(user_id, conta_id, categoria_id, descricao, valor, tipo, data,
                                status, modo_lancamento, recorrente_id, transacao_prevista_id, observacao,
                                id_externo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            owner,
            new.conta_id,
            new.categoria_id,
            new.descricao.trim(),
            new.valor.to_string(),
            new.tipo,
            new.data,
            Status::Realized,
            new.modo_lancamento,
            new.recorrente_id,
            replaces,
            new.observacao,
            new.id_externo
        ],
    )?;
    Ok(Transaction {
        id: conn.last_insert_rowid(),
        user_id: owner,
        conta_id: new.conta_id,
        categoria_id: new.categoria_id,
        descricao: new.descricao.trim().to_string(),
        valor: new.valor,
        tipo: new.tipo,
        data: new.data,
        status: Status::Realized,
        modo_lancamento: new.modo_lancamento,
        recorrente_id: new.recorrente_id,
        transacao_prevista_id: replaces,
        observacao: new.observacao.clone(),
        id_externo: new.id_externo.clone(),
    })
}

/// Retires `projected_id` and inserts its replacement. Must run inside an
/// open SQLite transaction so that a failure of either half rolls back both.
fn retire_and_insert(
    conn: &Connection,
    owner: i64,
    projected_id: i64,
    new: &NewTransaction,
) -> CoreResult<Transaction> {
    let retired = conn
        .execute(
            "UPDATE transacoes SET status='substituida'
             WHERE id=?1 AND user_id=?2 AND status='prevista'",
            params![projected_id, owner],
        )
        .map_err(|e| {
            CoreError::ReconciliationAtomicity(format!(
                "retiring projection {}: {}",
                projected_id, e
            ))
        })?;
    if retired != 1 {
        return Err(CoreError::ReconciliationAtomicity(format!(
            "projection {} is no longer outstanding",
            projected_id
        )));
    }
    let inserted = insert_realized(conn, owner, new, Some(projected_id)).map_err(|e| {
        CoreError::ReconciliationAtomicity(format!(
            "inserting replacement of {}: {}",
            projected_id, e
        ))
    })?;
    tracing::info!(
        projected = projected_id,
        realized = inserted.id,
        "projection reconciled"
    );
    Ok(inserted)
}

/// Month a projection belongs to: its `competencia` when generated from a
/// template, otherwise the month of its date.
fn projection_period(conn: &Connection, owner: i64, id: i64) -> CoreResult<Period> {
    let raw: String = conn
        .query_row(
            "SELECT COALESCE(competencia, substr(data, 1, 7)) FROM transacoes
             WHERE id=?1 AND user_id=?2",
            params![id, owner],
            |r| r.get(0),
        )
        .optional()
        .storage("transacoes")?
        .ok_or(CoreError::NotFound {
            entity: "transaction",
            id,
        })?;
    raw.parse()
}

fn ensure_in_period(period: Period, date: NaiveDate, projected_id: i64) -> CoreResult<()> {
    if period.contains(date) {
        return Ok(());
    }
    Err(CoreError::validation(format!(
        "date {} is outside {}, the month of projection {}",
        date, period, projected_id
    )))
}

fn outstanding_projection(
    conn: &Connection,
    owner: i64,
    template_id: i64,
    period: Period,
) -> CoreResult<Option<i64>> {
    conn.query_row(
        "SELECT id FROM transacoes
         WHERE user_id=?1 AND recorrente_id=?2 AND status='prevista'
           AND (competencia=?3 OR (data>=?4 AND data<=?5))
         ORDER BY data, id LIMIT 1",
        params![
            owner,
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

/// Body of [`record`] against an already-open SQLite transaction, so batch
/// writers (CSV import, receipts) can commit many rows at once.
pub fn record_in(conn: &Connection, owner: i64, mut new: NewTransaction) -> CoreResult<Recorded> {
    validate(&new)?;
    new.id_externo = new
        .id_externo
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let mut warnings = Vec::new();
    new.conta_id = resolve_reference(conn, "contas", "account", owner, new.conta_id, &mut warnings)?;
    new.categoria_id = resolve_reference(
        conn,
        "categorias",
        "category",
        owner,
        new.categoria_id,
        &mut warnings,
    )?;
    new.recorrente_id = resolve_reference(
        conn,
        "transacoes_recorrentes",
        "template",
        owner,
        new.recorrente_id,
        &mut warnings,
    )?;

    let matched = match new.recorrente_id {
        Some(template_id) => {
            outstanding_projection(conn, owner, template_id, Period::of(new.data))?
        }
        None => None,
    };

    let transaction = match matched {
        Some(projected_id) => retire_and_insert(conn, owner, projected_id, &new)?,
        None => insert_realized(conn, owner, &new, None).storage("inserting transaction")?,
    };
    Ok(Recorded {
        transaction,
        replaced: matched,
        warnings,
    })
}

/// Records a real transaction, reconciling it with the outstanding projection
/// of its template in the same month when there is one.
pub fn record(conn: &mut Connection, owner: i64, new: NewTransaction) -> CoreResult<Recorded> {
    let tx = conn.transaction().storage("begin transaction")?;
    let recorded = record_in(&tx, owner, new)?;
    commit(tx, recorded.replaced.is_some())?;
    Ok(recorded)
}

fn commit(tx: rusqlite::Transaction<'_>, reconciling: bool) -> CoreResult<()> {
    tx.commit().map_err(|e| {
        if reconciling {
            CoreError::ReconciliationAtomicity(format!("commit failed: {}", e))
        } else {
            CoreError::Storage {
                context: "commit".to_string(),
                source: e,
            }
        }
    })
}

/// Overrides applied when a projected row is marked as happened.
#[derive(Debug, Clone, Default)]
pub struct Realization {
    pub valor: Option<Decimal>,
    pub data: Option<NaiveDate>,
    pub conta_id: Option<i64>,
    pub observacao: Option<String>,
}

/// Turns a specific projected row into a realized one, carrying its fields
/// over unless overridden.
pub fn realize_projection(
    conn: &mut Connection,
    owner: i64,
    projected_id: i64,
    overrides: Realization,
) -> CoreResult<Recorded> {
    let tx = conn.transaction().storage("begin transaction")?;
    let projected = require_transaction(&tx, owner, projected_id)?;
    if projected.status != Status::Projected {
        return Err(CoreError::validation(format!(
            "transaction {} is {}, not prevista",
            projected_id, projected.status
        )));
    }
    let mut new = NewTransaction {
        conta_id: overrides.conta_id.or(projected.conta_id),
        categoria_id: projected.categoria_id,
        descricao: projected.descricao.clone(),
        valor: overrides.valor.unwrap_or(projected.valor),
        tipo: projected.tipo,
        data: overrides.data.unwrap_or(projected.data),
        modo_lancamento: EntryMode::Manual,
        recorrente_id: projected.recorrente_id,
        observacao: overrides.observacao.or(projected.observacao.clone()),
        id_externo: None,
    };
    validate(&new)?;
    ensure_in_period(projection_period(&tx, owner, projected_id)?, new.data, projected_id)?;
    let mut warnings = Vec::new();
    new.conta_id = resolve_reference(&tx, "contas", "account", owner, new.conta_id, &mut warnings)?;
    let transaction = retire_and_insert(&tx, owner, projected_id, &new)?;
    commit(tx, true)?;
    Ok(Recorded {
        transaction,
        replaced: Some(projected_id),
        warnings,
    })
}

/// Field edits. `Some(None)` clears an optional reference.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub valor: Option<Decimal>,
    pub data: Option<NaiveDate>,
    pub descricao: Option<String>,
    pub categoria_id: Option<Option<i64>>,
    pub conta_id: Option<Option<i64>>,
    pub observacao: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Updated {
    pub transaction: Transaction,
    pub warnings: Vec<Warning>,
}

/// Edits a transaction in place. Status and links are untouched, so editing
/// a realized replacement never brings its projection back. A date edit may
/// not move a linked row out of its projection's month.
pub fn update_transaction(
    conn: &Connection,
    owner: i64,
    id: i64,
    patch: TransactionPatch,
) -> CoreResult<Updated> {
    let mut t = require_transaction(conn, owner, id)?;
    if t.status == Status::Replaced {
        return Err(CoreError::validation(format!(
            "transaction {} was replaced by a realized entry and cannot be edited",
            id
        )));
    }
    if let Some(v) = patch.valor {
        ensure_positive("amount", v)?;
        t.valor = v;
    }
    if let Some(d) = patch.data.filter(|d| *d != t.data) {
        let anchor = match (t.status, t.recorrente_id, t.transacao_prevista_id) {
            (_, _, Some(projected)) => Some(projected),
            (Status::Projected, Some(_), None) => Some(id),
            _ => None,
        };
        if let Some(projected) = anchor {
            ensure_in_period(projection_period(conn, owner, projected)?, d, projected)?;
        }
        t.data = d;
    }
    if let Some(desc) = patch.descricao {
        if desc.trim().is_empty() {
            return Err(CoreError::validation("description must not be blank"));
        }
        t.descricao = desc.trim().to_string();
    }
    let mut warnings = Vec::new();
    if let Some(cat) = patch.categoria_id {
        t.categoria_id = resolve_reference(conn, "categorias", "category", owner, cat, &mut warnings)?;
    }
    if let Some(acct) = patch.conta_id {
        t.conta_id = resolve_reference(conn, "contas", "account", owner, acct, &mut warnings)?;
    }
    if let Some(obs) = patch.observacao {
        t.observacao = obs;
    }
    conn.execute(
        "UPDATE transacoes SET valor=?1, data=?2, descricao=?3, categoria_id=?4, conta_id=?5, observacao=?6
         WHERE id=?7 AND user_id=?8",
        params![
            t.valor.to_string(),
            t.data,
            t.descricao,
            t.categoria_id,
            t.conta_id,
            t.observacao,
            id,
            owner
        ],
    )
    .storage("updating transaction")?;
    Ok(Updated {
        transaction: t,
        warnings,
    })
}

/// Deletes a transaction. When it was the last realization of a projection,
/// the projection goes back to `prevista`.
pub fn delete_transaction(conn: &mut Connection, owner: i64, id: i64) -> CoreResult<Deleted> {
    let tx = conn.transaction().storage("begin transaction")?;
    let removed = require_transaction(&tx, owner, id)?;
    let referencing: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM transacoes WHERE transacao_prevista_id=?1",
            params![id],
            |r| r.get(0),
        )
        .storage("transacoes")?;
    if referencing > 0 {
        return Err(CoreError::validation(format!(
            "transaction {} is referenced by {} realized entr{}; delete those instead",
            id,
            referencing,
            if referencing == 1 { "y" } else { "ies" }
        )));
    }

    tx.execute(
        "DELETE FROM transacoes WHERE id=?1 AND user_id=?2",
        params![id, owner],
    )
    .storage("deleting transaction")?;

    let mut restored = None;
    if let Some(projected_id) = removed.transacao_prevista_id {
        let others: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM transacoes WHERE transacao_prevista_id=?1",
                params![projected_id],
                |r| r.get(0),
            )
            .storage("transacoes")?;
        if others == 0 {
            let n = tx
                .execute(
                    "UPDATE transacoes SET status='prevista'
                     WHERE id=?1 AND user_id=?2 AND status='substituida'",
                    params![projected_id, owner],
                )
                .storage("restoring projection")?;
            if n == 1 {
                tracing::info!(
                    projected = projected_id,
                    deleted = id,
                    "reconciliation undone, projection restored"
                );
                restored = Some(projected_id);
            }
        }
    }
    commit(tx, restored.is_some())?;
    Ok(Deleted { removed, restored })
}

/// Violations of the projection/replacement link invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum LinkIssue {
    /// A `substituida` row nobody points at.
    OrphanReplaced { projected: i64 },
    /// A row points at a projection that is not `substituida`.
    LiveTarget {
        realized: i64,
        projected: i64,
        status: Status,
    },
    /// A replacement that is not itself realized.
    UnrealizedReplacement { replacement: i64, status: Status },
    /// Replacement and projection belong to different templates.
    TemplateMismatch {
        realized: i64,
        projected: i64,
        realized_template: i64,
        projected_template: i64,
    },
    /// Replacement dated outside its projection's month.
    PeriodMismatch {
        realized: i64,
        projected: i64,
        realized_on: NaiveDate,
        projected_period: Period,
    },
}

/// Validation pass over the template -> projected -> realized graph.
pub fn check_links(conn: &Connection, owner: i64) -> CoreResult<Vec<LinkIssue>> {
    let mut issues = Vec::new();

    let mut stmt = conn
        .prepare(
            "SELECT p.id FROM transacoes p
             WHERE p.user_id=?1 AND p.status='substituida'
               AND NOT EXISTS (SELECT 1 FROM transacoes r WHERE r.transacao_prevista_id=p.id)
             ORDER BY p.id",
        )
        .storage("transacoes")?;
    let rows = stmt
        .query_map(params![owner], |r| r.get::<_, i64>(0))
        .storage("transacoes")?;
    for row in rows {
        issues.push(LinkIssue::OrphanReplaced {
            projected: row.storage("transacoes")?,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT r.id, r.status, r.recorrente_id, p.id, p.status, p.recorrente_id,
                    r.data, COALESCE(p.competencia, substr(p.data, 1, 7))
             FROM transacoes r JOIN transacoes p ON r.transacao_prevista_id=p.id
             WHERE r.user_id=?1 ORDER BY r.id",
        )
        .storage("transacoes")?;
    let rows = stmt
        .query_map(params![owner], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, Status>(1)?,
                r.get::<_, Option<i64>>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, Status>(4)?,
                r.get::<_, Option<i64>>(5)?,
                r.get::<_, NaiveDate>(6)?,
                r.get::<_, String>(7)?,
            ))
        })
        .storage("transacoes")?;
    for row in rows {
        let (rid, rstatus, rtpl, pid, pstatus, ptpl, rdate, pperiod) = row.storage("transacoes")?;
        let pperiod: Period = pperiod.parse()?;
        if !pperiod.contains(rdate) {
            issues.push(LinkIssue::PeriodMismatch {
                realized: rid,
                projected: pid,
                realized_on: rdate,
                projected_period: pperiod,
            });
        }
        if pstatus != Status::Replaced {
            issues.push(LinkIssue::LiveTarget {
                realized: rid,
                projected: pid,
                status: pstatus,
            });
        }
        if rstatus != Status::Realized {
            issues.push(LinkIssue::UnrealizedReplacement {
                replacement: rid,
                status: rstatus,
            });
        }
        if let (Some(a), Some(b)) = (rtpl, ptpl) {
            if a != b {
                issues.push(LinkIssue::TemplateMismatch {
                    realized: rid,
                    projected: pid,
                    realized_template: a,
                    projected_template: b,
                });
            }
        }
    }
    Ok(issues)
}
