// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bank statements: OFX parsing and duplicate detection for imports.
//!
//! OFX 1.x is SGML (leaf elements have no closing tag) and 2.x is XML. Both
//! are read by the same tag scanner, which only looks at `<STMTTRN>` blocks.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::models::{Kind, decimal_at};

const MAX_DESCRIPTION: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    /// FITID, unique per account at the bank.
    pub id_externo: Option<String>,
    pub data: NaiveDate,
    /// Signed as on the statement: negative is money out.
    pub valor: Decimal,
    pub descricao: String,
}

impl StatementLine {
    pub fn kind(&self) -> Kind {
        if self.valor < Decimal::ZERO {
            Kind::Expense
        } else {
            Kind::Income
        }
    }
}

#[derive(Default)]
struct Fields {
    fitid: Option<String>,
    posted: Option<String>,
    amount: Option<String>,
    name: Option<String>,
    memo: Option<String>,
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn ofx_date(raw: &str, n: usize) -> CoreResult<NaiveDate> {
    raw.get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .ok_or_else(|| CoreError::validation(format!("OFX transaction {}: bad DTPOSTED '{}'", n, raw)))
}

fn finish(fields: Fields, n: usize) -> CoreResult<Option<StatementLine>> {
    let posted = fields
        .posted
        .ok_or_else(|| CoreError::validation(format!("OFX transaction {}: DTPOSTED missing", n)))?;
    let data = ofx_date(&posted, n)?;
    let raw = fields
        .amount
        .ok_or_else(|| CoreError::validation(format!("OFX transaction {}: TRNAMT missing", n)))?;
    let valor = raw
        .replace(',', ".")
        .parse::<Decimal>()
        .map_err(|_| CoreError::validation(format!("OFX transaction {}: bad TRNAMT '{}'", n, raw)))?;
    if valor.is_zero() {
        tracing::debug!(n, "zero-amount OFX line skipped");
        return Ok(None);
    }
    let descricao: String = fields
        .memo
        .or(fields.name)
        .unwrap_or_else(|| "Lançamento sem descrição".to_string())
        .chars()
        .take(MAX_DESCRIPTION)
        .collect();
    Ok(Some(StatementLine {
        id_externo: fields.fitid,
        data,
        valor,
        descricao,
    }))
}

/// Statement lines of every account in the file, sorted by date.
pub fn parse_ofx(content: &str) -> CoreResult<Vec<StatementLine>> {
    let mut lines = Vec::new();
    let mut current: Option<Fields> = None;
    let mut n = 0;
    // First chunk is the SGML header or XML prolog.
    for chunk in content.split('<').skip(1) {
        let Some((tag, rest)) = chunk.split_once('>') else {
            continue;
        };
        let tag = tag.trim().to_ascii_uppercase();
        let value = unescape(rest.trim());
        match tag.as_str() {
            "STMTTRN" => {
                n += 1;
                current = Some(Fields::default());
            }
            "/STMTTRN" => {
                if let Some(fields) = current.take() {
                    lines.extend(finish(fields, n)?);
                }
            }
            _ => {
                let Some(fields) = current.as_mut() else {
                    continue;
                };
                let slot = match tag.as_str() {
                    "FITID" => &mut fields.fitid,
                    "DTPOSTED" => &mut fields.posted,
                    "TRNAMT" => &mut fields.amount,
                    "NAME" => &mut fields.name,
                    "MEMO" => &mut fields.memo,
                    _ => continue,
                };
                if !value.is_empty() {
                    *slot = Some(value);
                }
            }
        }
    }
    if current.is_some() {
        return Err(CoreError::validation(format!(
            "OFX transaction {} is not closed",
            n
        )));
    }
    lines.sort_by(|a, b| {
        (a.data, a.valor, &a.descricao).cmp(&(b.data, b.valor, &b.descricao))
    });
    Ok(lines)
}

/// What an incoming line is compared on.
#[derive(Debug, Clone, Copy)]
pub struct ImportKey<'a> {
    pub id_externo: Option<&'a str>,
    pub data: NaiveDate,
    /// Unsigned, as stored.
    pub valor: Decimal,
    pub tipo: Kind,
    pub descricao: &'a str,
}

fn normalized(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Duplicate detection across repeated imports of the same statement.
///
/// A line with an external id is a duplicate of any row carrying that id.
/// Otherwise it matches a realized row without external id on the same date
/// with the same kind, amount and description. Only rows that existed when the
/// import started are candidates, and each absorbs at most one line, so two
/// identical purchases in one file are both kept.
#[derive(Debug)]
pub struct Dedup {
    ceiling: i64,
    claimed: HashSet<i64>,
}

impl Dedup {
    pub fn begin(conn: &Connection, owner: i64) -> CoreResult<Self> {
        let ceiling: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) FROM transacoes WHERE user_id=?1",
                params![owner],
                |r| r.get(0),
            )
            .storage("transacoes")?;
        Ok(Self {
            ceiling,
            claimed: HashSet::new(),
        })
    }

    /// The existing row `key` duplicates, if any. A returned row is claimed.
    pub fn claim(&mut self, conn: &Connection, owner: i64, key: &ImportKey<'_>) -> CoreResult<Option<i64>> {
        if let Some(ext) = key.id_externo {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT id FROM transacoes WHERE user_id=?1 AND id_externo=?2",
                    params![owner, ext],
                    |r| r.get(0),
                )
                .optional()
                .storage("transacoes")?;
            if hit.is_some() {
                return Ok(hit);
            }
        }

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, valor, descricao FROM transacoes
                 WHERE user_id=?1 AND id<=?2 AND data=?3 AND tipo=?4
                   AND status='realizada' AND id_externo IS NULL
                 ORDER BY id",
            )
            .storage("transacoes")?;
        let rows = stmt
            .query_map(params![owner, self.ceiling, key.data, key.tipo], |r| {
                Ok((r.get::<_, i64>(0)?, decimal_at(r, 1)?, r.get::<_, String>(2)?))
            })
            .storage("transacoes")?;
        let wanted = normalized(key.descricao);
        for row in rows {
            let (id, valor, descricao) = row.storage("transacoes")?;
            if valor == key.valor && normalized(&descricao) == wanted && !self.claimed.contains(&id) {
                self.claimed.insert(id);
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}
