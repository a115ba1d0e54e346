// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Receipt ingestion. A receipt is either written straight away (automatic
//! mode) or staged for review and confirmed later (semi-automatic mode).
//! Both paths share one write routine.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, StorageContext, Warning};
use crate::models::{EntryMode, Kind, LineItem, StagingStatus, Transaction};
use crate::reconcile::{self, NewTransaction};
use crate::store::owned_row_exists;
use crate::suggest::{self, CategoryMatcher};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub establishment: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    pub date: NaiveDate,
    pub total: Decimal,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

impl Receipt {
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let receipt: Receipt = serde_json::from_str(raw)?;
        receipt.validate()?;
        Ok(receipt)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.establishment.trim().is_empty() {
            return Err(CoreError::validation("receipt establishment must not be blank"));
        }
        if self.total <= Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "receipt total must be positive (got {})",
                self.total
            )));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.quantity <= Decimal::ZERO {
                return Err(CoreError::validation(format!(
                    "item {} quantity must be positive",
                    i + 1
                )));
            }
            if item.unit_price < Decimal::ZERO || item.line_total < Decimal::ZERO {
                return Err(CoreError::validation(format!(
                    "item {} prices must not be negative",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

/// Category suggestions for a receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suggestions {
    pub parent: Option<i64>,
    pub items: Vec<Option<i64>>,
    pub needs_review: usize,
}

/// Parent category: the establishment's own suggestion, else the item
/// category with the largest total (ties go to the lower id).
pub fn suggest_for(matcher: &dyn CategoryMatcher, receipt: &Receipt) -> Suggestions {
    let items: Vec<Option<i64>> = receipt
        .items
        .iter()
        .map(|i| matcher.suggest(&i.description))
        .collect();
    let needs_review = items.iter().filter(|s| s.is_none()).count();

    let parent = matcher.suggest(&receipt.establishment).or_else(|| {
        let mut totals: BTreeMap<i64, Decimal> = BTreeMap::new();
        for (item, cat) in receipt.items.iter().zip(&items) {
            if let Some(cat) = cat {
                *totals.entry(*cat).or_default() += item.line_total;
            }
        }
        totals
            .into_iter()
            .fold(None, |best: Option<(i64, Decimal)>, (id, total)| match best {
                Some((_, t)) if t >= total => best,
                _ => Some((id, total)),
            })
            .map(|(id, _)| id)
    });

    Suggestions {
        parent,
        items,
        needs_review,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub transaction: Transaction,
    pub items: Vec<LineItem>,
    pub needs_review: usize,
    pub warnings: Vec<Warning>,
}

fn write_receipt(
    conn: &Connection,
    owner: i64,
    receipt: &Receipt,
    conta_id: Option<i64>,
    suggestions: &Suggestions,
    mode: EntryMode,
) -> CoreResult<Ingested> {
    let recorded = reconcile::record_in(
        conn,
        owner,
        NewTransaction {
            conta_id,
            categoria_id: suggestions.parent,
            descricao: receipt.establishment.trim().to_string(),
            valor: receipt.total,
            tipo: Kind::Expense,
            data: receipt.date,
            modo_lancamento: mode,
            recorrente_id: None,
            observacao: receipt.tax_id.as_ref().map(|t| format!("CNPJ {}", t.trim())),
            id_externo: None,
        },
    )?;
    let transacao_id = recorded.transaction.id;

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO itens_transacao(transacao_id, descricao, quantidade, valor_unitario,
                                         valor_total, categoria_sugerida_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .storage("itens_transacao")?;
    let mut items = Vec::with_capacity(receipt.items.len());
    for (item, cat) in receipt.items.iter().zip(&suggestions.items) {
        stmt.execute(params![
            transacao_id,
            item.description.trim(),
            item.quantity.to_string(),
            item.unit_price.to_string(),
            item.line_total.to_string(),
            cat
        ])
        .storage("itens_transacao")?;
        items.push(LineItem {
            id: conn.last_insert_rowid(),
            transacao_id,
            descricao: item.description.trim().to_string(),
            quantidade: item.quantity,
            valor_unitario: item.unit_price,
            valor_total: item.line_total,
            categoria_sugerida_id: *cat,
        });
    }
    tracing::debug!(
        transaction = transacao_id,
        items = items.len(),
        needs_review = suggestions.needs_review,
        ?mode,
        "receipt written"
    );
    Ok(Ingested {
        transaction: recorded.transaction,
        items,
        needs_review: suggestions.needs_review,
        warnings: recorded.warnings,
    })
}

fn ensure_account(conn: &Connection, owner: i64, conta_id: Option<i64>) -> CoreResult<()> {
    match conta_id {
        Some(id) if !owned_row_exists(conn, "contas", owner, id)? => Err(CoreError::NotFound {
            entity: "account",
            id,
        }),
        _ => Ok(()),
    }
}

/// Writes the receipt as one realized transaction plus its line items.
pub fn ingest_automatic(
    conn: &mut Connection,
    owner: i64,
    receipt: &Receipt,
    conta_id: Option<i64>,
) -> CoreResult<Ingested> {
    receipt.validate()?;
    ensure_account(conn, owner, conta_id)?;
    let matcher = suggest::for_owner(conn, owner)?;
    let suggestions = suggest_for(&matcher, receipt);

    let tx = conn.transaction().storage("begin transaction")?;
    let ingested = write_receipt(&tx, owner, receipt, conta_id, &suggestions, EntryMode::Automatic)?;
    tx.commit().storage("commit receipt")?;
    Ok(ingested)
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedReceipt {
    pub id: i64,
    pub conta_id: Option<i64>,
    pub status: StagingStatus,
    pub transacao_id: Option<i64>,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Serialize)]
pub struct Staged {
    pub id: i64,
    pub suggestions: Suggestions,
}

/// Stores the receipt for review. Nothing is written to `transacoes`.
pub fn stage(
    conn: &Connection,
    owner: i64,
    receipt: &Receipt,
    conta_id: Option<i64>,
) -> CoreResult<Staged> {
    receipt.validate()?;
    ensure_account(conn, owner, conta_id)?;
    let payload = serde_json::to_string(receipt)?;
    conn.execute(
        "INSERT INTO recibos_pendentes(user_id, conta_id, payload, status) VALUES (?1, ?2, ?3, ?4)",
        params![owner, conta_id, payload, StagingStatus::Pending],
    )
    .storage("recibos_pendentes")?;
    let id = conn.last_insert_rowid();
    let matcher = suggest::for_owner(conn, owner)?;
    Ok(Staged {
        id,
        suggestions: suggest_for(&matcher, receipt),
    })
}

fn load_staged(conn: &Connection, owner: i64, id: i64) -> CoreResult<StagedReceipt> {
    let row = conn
        .query_row(
            "SELECT id, conta_id, status, transacao_id, payload FROM recibos_pendentes
             WHERE id=?1 AND user_id=?2",
            params![id, owner],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, Option<i64>>(1)?,
                    r.get::<_, StagingStatus>(2)?,
                    r.get::<_, Option<i64>>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .storage("recibos_pendentes")?;
    let Some((id, conta_id, status, transacao_id, payload)) = row else {
        return Err(CoreError::NotFound {
            entity: "staged receipt",
            id,
        });
    };
    Ok(StagedReceipt {
        id,
        conta_id,
        status,
        transacao_id,
        receipt: serde_json::from_str(&payload)?,
    })
}

pub fn list_staged(
    conn: &Connection,
    owner: i64,
    status: Option<StagingStatus>,
) -> CoreResult<Vec<StagedReceipt>> {
    let ids: Vec<i64> = {
        let mut stmt = conn
            .prepare(
                "SELECT id FROM recibos_pendentes WHERE user_id=?1 AND (?2 IS NULL OR status=?2)
                 ORDER BY id",
            )
            .storage("recibos_pendentes")?;
        let rows = stmt
            .query_map(params![owner, status], |r| r.get(0))
            .storage("recibos_pendentes")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .storage("recibos_pendentes")?
    };
    ids.into_iter().map(|id| load_staged(conn, owner, id)).collect()
}

fn ensure_pending(staged: &StagedReceipt) -> CoreResult<()> {
    if staged.status != StagingStatus::Pending {
        return Err(CoreError::validation(format!(
            "staged receipt {} is already {}",
            staged.id, staged.status
        )));
    }
    Ok(())
}

/// Confirms a staged receipt: writes it in semi-automatic mode and marks the
/// staged row processed, both or neither. `categoria_id` overrides the
/// suggested parent category.
pub fn confirm(
    conn: &mut Connection,
    owner: i64,
    staged_id: i64,
    categoria_id: Option<i64>,
) -> CoreResult<Ingested> {
    let tx = conn.transaction().storage("begin transaction")?;
    let staged = load_staged(&tx, owner, staged_id)?;
    ensure_pending(&staged)?;
    if let Some(id) = categoria_id {
        if !owned_row_exists(&tx, "categorias", owner, id)? {
            return Err(CoreError::NotFound {
                entity: "category",
                id,
            });
        }
    }
    let matcher = suggest::for_owner(&tx, owner)?;
    let mut suggestions = suggest_for(&matcher, &staged.receipt);
    if categoria_id.is_some() {
        suggestions.parent = categoria_id;
    }
    let ingested = write_receipt(
        &tx,
        owner,
        &staged.receipt,
        staged.conta_id,
        &suggestions,
        EntryMode::SemiAutomatic,
    )?;
    let marked = tx
        .execute(
            "UPDATE recibos_pendentes SET status=?1, transacao_id=?2
             WHERE id=?3 AND user_id=?4 AND status=?5",
            params![
                StagingStatus::Processed,
                ingested.transaction.id,
                staged_id,
                owner,
                StagingStatus::Pending
            ],
        )
        .storage("recibos_pendentes")?;
    if marked != 1 {
        return Err(CoreError::validation(format!(
            "staged receipt {} stopped being pending while confirming",
            staged_id
        )));
    }
    tx.commit().storage("commit receipt")?;
    tracing::info!(staged = staged_id, transaction = ingested.transaction.id, "receipt confirmed");
    Ok(ingested)
}

pub fn discard(conn: &Connection, owner: i64, staged_id: i64) -> CoreResult<()> {
    let staged = load_staged(conn, owner, staged_id)?;
    ensure_pending(&staged)?;
    let n = conn
        .execute(
            "UPDATE recibos_pendentes SET status=?1 WHERE id=?2 AND user_id=?3 AND status=?4",
            params![StagingStatus::Discarded, staged_id, owner, StagingStatus::Pending],
        )
        .storage("recibos_pendentes")?;
    if n != 1 {
        return Err(CoreError::validation(format!(
            "staged receipt {} is no longer pending",
            staged_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::suggest::{Chain, Keywords};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(description: &str, line_total: Decimal) -> ReceiptItem {
        ReceiptItem {
            description: description.to_string(),
            quantity: Decimal::ONE,
            unit_price: line_total,
            line_total,
        }
    }

    fn receipt(establishment: &str, items: Vec<ReceiptItem>) -> Receipt {
        Receipt {
            establishment: establishment.to_string(),
            tax_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            total: items.iter().map(|i| i.line_total).sum(),
            items,
        }
    }

    fn matcher() -> Chain {
        let cats: Vec<Category> = [(1, "Alimentação"), (2, "Saúde")]
            .into_iter()
            .map(|(id, nome)| Category {
                id,
                user_id: 1,
                nome: nome.to_string(),
                tipo: Kind::Expense,
                icone: String::new(),
                ativo: true,
            })
            .collect();
        Chain::new().with(Keywords::with_defaults(&cats))
    }

    #[test]
    fn parent_falls_back_to_largest_item_category() {
        let r = receipt(
            "Comercial Silva Ltda",
            vec![
                item("Pão francês padaria", d("8.00")),
                item("Dipirona farmácia", d("15.50")),
                item("Parafuso 3mm", d("2.00")),
            ],
        );
        let s = suggest_for(&matcher(), &r);
        assert_eq!(s.items, vec![Some(1), Some(2), None]);
        assert_eq!(s.parent, Some(2));
        assert_eq!(s.needs_review, 1);
    }

    #[test]
    fn establishment_suggestion_wins() {
        let r = receipt("Supermercado Bom Preço", vec![item("Drogaria item", d("50"))]);
        assert_eq!(suggest_for(&matcher(), &r).parent, Some(1));
    }

    #[test]
    fn rejects_non_positive_quantities() {
        let mut r = receipt("Loja", vec![item("x", d("1"))]);
        r.items[0].quantity = Decimal::ZERO;
        assert!(matches!(r.validate(), Err(CoreError::Validation(_))));
        let mut r = receipt("Loja", vec![]);
        r.total = Decimal::ZERO;
        assert!(r.validate().is_err());
    }

    #[test]
    fn parses_numbers_or_strings() {
        let r = Receipt::from_json(
            r#"{"establishment":"Padaria","date":"2025-03-10","total":"12.50",
                "items":[{"description":"pão","quantity":2,"unit_price":"6.25","line_total":12.5}]}"#,
        )
        .unwrap();
        assert_eq!(r.total, d("12.50"));
        assert_eq!(r.items[0].quantity, d("2"));
    }
}
