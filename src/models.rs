// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Storage format of knowledge timestamps. Second precision keeps the text
/// ordering identical to the chronological one.
pub const KNOWN_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Enums persisted as their Portuguese label.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label => Ok($name::$variant),)+
                    other => Err(CoreError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: CoreError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(Kind {
    Income => "receita",
    Expense => "despesa",
});

text_enum!(Status {
    Realized => "realizada",
    Projected => "prevista",
    Replaced => "substituida",
});

text_enum!(EntryMode {
    Manual => "manual",
    Automatic => "automatico",
    SemiAutomatic => "semi_automatico",
});

text_enum!(AccountKind {
    Checking => "corrente",
    Savings => "poupanca",
    Wallet => "carteira",
    CreditCard => "cartao_credito",
});

text_enum!(BudgetNature {
    Limit => "teto",
    Goal => "meta",
});

text_enum!(StagingStatus {
    Pending => "pendente",
    Processed => "processado",
    Discarded => "descartado",
});

text_enum!(BillKind {
    Payable => "pagar",
    Receivable => "receber",
});

impl BillKind {
    /// Kind of the transaction recorded when the bill is settled.
    pub fn kind(&self) -> Kind {
        match self {
            BillKind::Payable => Kind::Expense,
            BillKind::Receivable => Kind::Income,
        }
    }
}

text_enum!(PaymentMethod {
    Card => "cartao",
    Pix => "pix",
    Debit => "debito",
    Cash => "dinheiro",
    Transfer => "transferencia",
    Other => "outro",
});

/// Longest run of months a single call may walk.
pub const MAX_MONTHS: u32 = 1200;

/// A calendar month, the granularity of projections and budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::validation(format!(
                "invalid period {}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// The given day of this month, clamped to the month's last day.
    pub fn clamped_day(&self, day: u32) -> NaiveDate {
        let d = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, d).unwrap_or_else(|| self.last_day())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// `months` consecutive periods starting at this one.
    pub fn span(self, months: u32) -> Result<Vec<Self>, CoreError> {
        if months > MAX_MONTHS {
            return Err(CoreError::validation(format!(
                "{} months requested, at most {} allowed",
                months, MAX_MONTHS
            )));
        }
        let mut out = Vec::with_capacity(months as usize);
        let mut p = self;
        for _ in 0..months {
            out.push(p);
            p = p.next();
        }
        Ok(out)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| CoreError::validation(format!("invalid month '{}', expected YYYY-MM", s)))?;
        let year: i32 = y
            .parse()
            .map_err(|_| CoreError::validation(format!("invalid year in '{}'", s)))?;
        let month: u32 = m
            .parse()
            .map_err(|_| CoreError::validation(format!("invalid month in '{}'", s)))?;
        Period::new(year, month)
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub nome: String,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub nome: String,
    pub tipo: Kind,
    pub icone: String,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub nome: String,
    pub tipo: AccountKind,
    pub saldo_inicial: Decimal,
    pub data_saldo_inicial: NaiveDate,
    pub dia_fechamento: Option<u32>,
    pub dia_vencimento: Option<u32>,
    pub ativo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub conta_id: Option<i64>,
    pub categoria_id: Option<i64>,
    pub descricao: String,
    pub valor: Decimal, // always non-negative, sign comes from tipo
    pub tipo: Kind,
    pub data: NaiveDate,
    pub status: Status,
    pub modo_lancamento: EntryMode,
    pub recorrente_id: Option<i64>,
    pub transacao_prevista_id: Option<i64>,
    pub observacao: Option<String>,
    /// Statement id of imported rows.
    pub id_externo: Option<String>,
}

impl Transaction {
    pub(crate) const COLUMNS: &'static str = "id, user_id, conta_id, categoria_id, descricao, valor, tipo, data, status, modo_lancamento, recorrente_id, transacao_prevista_id, observacao, id_externo";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            user_id: r.get(1)?,
            conta_id: r.get(2)?,
            categoria_id: r.get(3)?,
            descricao: r.get(4)?,
            valor: decimal_at(r, 5)?,
            tipo: r.get(6)?,
            data: r.get(7)?,
            status: r.get(8)?,
            modo_lancamento: r.get(9)?,
            recorrente_id: r.get(10)?,
            transacao_prevista_id: r.get(11)?,
            observacao: r.get(12)?,
            id_externo: r.get(13)?,
        })
    }

    /// Signed contribution to cash flow: receitas positive, despesas negative.
    pub fn signed(&self) -> Decimal {
        match self.tipo {
            Kind::Income => self.valor,
            Kind::Expense => -self.valor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub user_id: i64,
    pub descricao: String,
    pub valor: Decimal,
    pub tipo: BillKind,
    pub data_vencimento: NaiveDate,
    pub categoria_id: Option<i64>,
    pub conta_id: Option<i64>,
    pub forma_pagamento: PaymentMethod,
    pub pago: bool,
    pub data_pagamento: Option<NaiveDate>,
    pub transacao_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: i64,
    pub user_id: i64,
    pub conta_id: Option<i64>,
    pub categoria_id: Option<i64>,
    pub descricao: String,
    pub valor: Decimal,
    pub tipo: Kind,
    pub dia_do_mes: u32,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub categoria_id: i64,
    pub valor_limite: Decimal,
    pub periodo: String,
    pub natureza: BudgetNature,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub user_id: i64,
    pub nome: String,
    pub ativo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub id: i64,
    pub investimento_id: i64,
    pub data_referencia: NaiveDate,
    pub data_conhecido_em: NaiveDateTime,
    pub saldo: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub transacao_id: i64,
    pub descricao: String,
    pub quantidade: Decimal,
    pub valor_unitario: Decimal,
    pub valor_total: Decimal,
    pub categoria_sugerida_id: Option<i64>,
}

/// Read a decimal stored as TEXT.
pub(crate) fn decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    raw.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a knowledge timestamp stored as TEXT.
pub(crate) fn timestamp_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = r.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, KNOWN_AT_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
