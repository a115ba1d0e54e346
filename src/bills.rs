// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bills to pay or receive. Settling a bill records a realized transaction
//! through the normal write path and links it back; reopening the bill
//! removes that transaction again.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::models::{Bill, BillKind, EntryMode, PaymentMethod, Period, decimal_at};
use crate::reconcile::{self, NewTransaction, Recorded};
use crate::store::{ensure_name, ensure_positive, owned_row_exists, remove_owned};

#[derive(Debug, Clone)]
pub struct NewBill {
    pub descricao: String,
    pub valor: Decimal,
    pub tipo: BillKind,
    pub data_vencimento: NaiveDate,
    pub categoria_id: Option<i64>,
    pub conta_id: Option<i64>,
    pub forma_pagamento: PaymentMethod,
}

const BILL_COLUMNS: &str = "id, user_id, descricao, valor, tipo, data_vencimento, categoria_id, conta_id, forma_pagamento, pago, data_pagamento, transacao_id";

fn bill_from_row(r: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: r.get(0)?,
        user_id: r.get(1)?,
        descricao: r.get(2)?,
        valor: decimal_at(r, 3)?,
        tipo: r.get(4)?,
        data_vencimento: r.get(5)?,
        categoria_id: r.get(6)?,
        conta_id: r.get(7)?,
        forma_pagamento: r.get(8)?,
        pago: r.get(9)?,
        data_pagamento: r.get(10)?,
        transacao_id: r.get(11)?,
    })
}

fn ensure_reference(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    owner: i64,
    id: Option<i64>,
) -> CoreResult<()> {
    match id {
        Some(id) if !owned_row_exists(conn, table, owner, id)? => {
            Err(CoreError::NotFound { entity, id })
        }
        _ => Ok(()),
    }
}

pub fn create_bill(conn: &Connection, owner: i64, new: NewBill) -> CoreResult<Bill> {
    let descricao = ensure_name("bill description", &new.descricao)?;
    ensure_positive("bill amount", new.valor)?;
    ensure_reference(conn, "categorias", "category", owner, new.categoria_id)?;
    ensure_reference(conn, "contas", "account", owner, new.conta_id)?;
    conn.execute(
        "INSERT INTO contas_pagaveis(user_id, descricao, valor, tipo, data_vencimento,
                                     categoria_id, conta_id, forma_pagamento)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            owner,
            descricao,
            new.valor.to_string(),
            new.tipo,
            new.data_vencimento,
            new.categoria_id,
            new.conta_id,
            new.forma_pagamento
        ],
    )
    .storage("contas_pagaveis")?;
    Ok(Bill {
        id: conn.last_insert_rowid(),
        user_id: owner,
        descricao,
        valor: new.valor,
        tipo: new.tipo,
        data_vencimento: new.data_vencimento,
        categoria_id: new.categoria_id,
        conta_id: new.conta_id,
        forma_pagamento: new.forma_pagamento,
        pago: false,
        data_pagamento: None,
        transacao_id: None,
    })
}

pub fn get_bill(conn: &Connection, owner: i64, id: i64) -> CoreResult<Option<Bill>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM contas_pagaveis WHERE id=?1 AND user_id=?2",
            BILL_COLUMNS
        ),
        params![id, owner],
        bill_from_row,
    )
    .optional()
    .storage("contas_pagaveis")
}

fn require_bill(conn: &Connection, owner: i64, id: i64) -> CoreResult<Bill> {
    get_bill(conn, owner, id)?.ok_or(CoreError::NotFound { entity: "bill", id })
}

#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub tipo: Option<BillKind>,
    pub pago: Option<bool>,
    /// Month of the due date.
    pub period: Option<Period>,
}

/// Bills by due date.
pub fn list_bills(conn: &Connection, owner: i64, filter: &BillFilter) -> CoreResult<Vec<Bill>> {
    let (from, to) = match filter.period {
        Some(p) => (Some(p.first_day()), Some(p.last_day())),
        None => (None, None),
    };
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM contas_pagaveis
             WHERE user_id=?1 AND (?2 IS NULL OR tipo=?2) AND (?3 IS NULL OR pago=?3)
               AND (?4 IS NULL OR data_vencimento>=?4) AND (?5 IS NULL OR data_vencimento<=?5)
             ORDER BY data_vencimento, id",
            BILL_COLUMNS
        ))
        .storage("contas_pagaveis")?;
    let rows = stmt
        .query_map(
            params![owner, filter.tipo, filter.pago, from, to],
            bill_from_row,
        )
        .storage("contas_pagaveis")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("contas_pagaveis")
}

/// Open bills already past their due date on `today`.
pub fn overdue(conn: &Connection, owner: i64, today: NaiveDate) -> CoreResult<Vec<Bill>> {
    let open = list_bills(
        conn,
        owner,
        &BillFilter {
            pago: Some(false),
            ..Default::default()
        },
    )?;
    Ok(open
        .into_iter()
        .filter(|b| b.data_vencimento < today)
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub descricao: Option<String>,
    pub valor: Option<Decimal>,
    pub data_vencimento: Option<NaiveDate>,
    pub forma_pagamento: Option<PaymentMethod>,
    pub categoria_id: Option<Option<i64>>,
}

/// Edits an open bill. A settled bill must be reopened first so that its
/// transaction never disagrees with it.
pub fn update_bill(conn: &Connection, owner: i64, id: i64, patch: BillPatch) -> CoreResult<Bill> {
    let mut bill = require_bill(conn, owner, id)?;
    if bill.pago {
        return Err(CoreError::validation(format!(
            "bill {} is settled; reopen it before editing",
            id
        )));
    }
    if let Some(d) = patch.descricao {
        bill.descricao = ensure_name("bill description", &d)?;
    }
    if let Some(v) = patch.valor {
        ensure_positive("bill amount", v)?;
        bill.valor = v;
    }
    if let Some(d) = patch.data_vencimento {
        bill.data_vencimento = d;
    }
    if let Some(f) = patch.forma_pagamento {
        bill.forma_pagamento = f;
    }
    if let Some(cat) = patch.categoria_id {
        ensure_reference(conn, "categorias", "category", owner, cat)?;
        bill.categoria_id = cat;
    }
    conn.execute(
        "UPDATE contas_pagaveis
         SET descricao=?1, valor=?2, data_vencimento=?3, forma_pagamento=?4, categoria_id=?5
         WHERE id=?6 AND user_id=?7",
        params![
            bill.descricao,
            bill.valor.to_string(),
            bill.data_vencimento,
            bill.forma_pagamento,
            bill.categoria_id,
            id,
            owner
        ],
    )
    .storage("contas_pagaveis")?;
    Ok(bill)
}

#[derive(Debug, Clone, Serialize)]
pub struct Settled {
    pub bill: Bill,
    pub recorded: Recorded,
}

/// Settles a bill on `paid_on`: records the realized transaction and marks
/// the bill paid, both or neither. `conta_id` overrides the bill's account.
pub fn mark_paid(
    conn: &mut Connection,
    owner: i64,
    id: i64,
    paid_on: NaiveDate,
    conta_id: Option<i64>,
) -> CoreResult<Settled> {
    let tx = conn.transaction().storage("begin transaction")?;
    let mut bill = require_bill(&tx, owner, id)?;
    if bill.pago {
        return Err(CoreError::validation(format!("bill {} is already settled", id)));
    }
    ensure_reference(&tx, "contas", "account", owner, conta_id)?;
    let conta_id = conta_id.or(bill.conta_id);
    let recorded = reconcile::record_in(
        &tx,
        owner,
        NewTransaction {
            conta_id,
            categoria_id: bill.categoria_id,
            descricao: bill.descricao.clone(),
            valor: bill.valor,
            tipo: bill.tipo.kind(),
            data: paid_on,
            modo_lancamento: EntryMode::Manual,
            recorrente_id: None,
            observacao: Some(format!(
                "vencimento {} via {}",
                bill.data_vencimento, bill.forma_pagamento
            )),
            id_externo: None,
        },
    )?;
    let n = tx
        .execute(
            "UPDATE contas_pagaveis SET pago=1, data_pagamento=?1, transacao_id=?2, conta_id=?3
             WHERE id=?4 AND user_id=?5 AND pago=0",
            params![paid_on, recorded.transaction.id, conta_id, id, owner],
        )
        .storage("contas_pagaveis")?;
    if n != 1 {
        return Err(CoreError::validation(format!(
            "bill {} was settled concurrently",
            id
        )));
    }
    tx.commit().storage("commit bill payment")?;
    tracing::info!(bill = id, transaction = recorded.transaction.id, "bill settled");

    bill.pago = true;
    bill.data_pagamento = Some(paid_on);
    bill.transacao_id = Some(recorded.transaction.id);
    bill.conta_id = conta_id;
    Ok(Settled { bill, recorded })
}

/// Reopens a settled bill and deletes the transaction its payment recorded.
pub fn mark_pending(conn: &mut Connection, owner: i64, id: i64) -> CoreResult<Bill> {
    let tx = conn.transaction().storage("begin transaction")?;
    let mut bill = require_bill(&tx, owner, id)?;
    if !bill.pago {
        return Err(CoreError::validation(format!("bill {} is not settled", id)));
    }
    if let Some(t) = bill.transacao_id {
        tx.execute(
            "DELETE FROM transacoes WHERE id=?1 AND user_id=?2",
            params![t, owner],
        )
        .storage("deleting bill payment")?;
    }
    tx.execute(
        "UPDATE contas_pagaveis SET pago=0, data_pagamento=NULL, transacao_id=NULL
         WHERE id=?1 AND user_id=?2",
        params![id, owner],
    )
    .storage("contas_pagaveis")?;
    tx.commit().storage("commit bill reopen")?;
    tracing::info!(bill = id, "bill reopened");

    bill.pago = false;
    bill.data_pagamento = None;
    bill.transacao_id = None;
    Ok(bill)
}

/// Deletes the bill. The transaction of a settled bill stays: the money moved.
pub fn delete_bill(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    remove_owned(conn, "contas_pagaveis", "bill", owner, id)
}
