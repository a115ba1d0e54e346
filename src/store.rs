// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Master data: users, categories, accounts and recurring templates.
//!
//! Every lookup is scoped by owner. Master-data rows are soft-deleted through
//! their `ativo` flag; the hard `remove_*` variants rely on the schema's
//! `ON DELETE SET NULL` so transactions keep their history.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, StorageContext};
use crate::models::{
    Account, AccountKind, Category, Kind, RecurringTemplate, Transaction, User, decimal_at,
};

pub(crate) fn ensure_positive(what: &str, v: Decimal) -> CoreResult<()> {
    if v <= Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "{} must be greater than zero (got {})",
            what, v
        )));
    }
    Ok(())
}

pub(crate) fn ensure_day(what: &str, day: u32) -> CoreResult<()> {
    if !(1..=31).contains(&day) {
        return Err(CoreError::validation(format!(
            "{} must be between 1 and 31 (got {})",
            what, day
        )));
    }
    Ok(())
}

pub(crate) fn ensure_name(what: &str, name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation(format!("{} must not be blank", what)));
    }
    Ok(name.to_string())
}

/// Whether `id` exists in `table` for this owner. `table` is always a
/// compile-time table name.
pub(crate) fn owned_row_exists(
    conn: &Connection,
    table: &str,
    owner: i64,
    id: i64,
) -> CoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id=?1 AND user_id=?2", table),
            params![id, owner],
            |r| r.get(0),
        )
        .optional()
        .storage(table)?;
    Ok(found.is_some())
}

fn set_active(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    owner: i64,
    id: i64,
    active: bool,
) -> CoreResult<()> {
    let n = conn
        .execute(
            &format!("UPDATE {} SET ativo=?1 WHERE id=?2 AND user_id=?3", table),
            params![active, id, owner],
        )
        .storage(table)?;
    if n == 0 {
        return Err(CoreError::NotFound { entity, id });
    }
    Ok(())
}

pub(crate) fn remove_owned(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    owner: i64,
    id: i64,
) -> CoreResult<()> {
    let n = conn
        .execute(
            &format!("DELETE FROM {} WHERE id=?1 AND user_id=?2", table),
            params![id, owner],
        )
        .storage(table)?;
    if n == 0 {
        return Err(CoreError::NotFound { entity, id });
    }
    Ok(())
}

// ---- users ----

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        nome: r.get(2)?,
        ativo: r.get(3)?,
    })
}

pub fn create_user(conn: &Connection, email: &str, nome: &str) -> CoreResult<User> {
    let email = ensure_name("email", email)?.to_lowercase();
    if !email.contains('@') {
        return Err(CoreError::validation(format!("invalid email '{}'", email)));
    }
    let nome = ensure_name("name", nome)?;
    conn.execute(
        "INSERT INTO usuarios(email, nome) VALUES (?1, ?2)",
        params![email, nome],
    )
    .storage("usuarios (email must be unique)")?;
    Ok(User {
        id: conn.last_insert_rowid(),
        email,
        nome,
        ativo: true,
    })
}

pub fn find_user(conn: &Connection, email: &str) -> CoreResult<Option<User>> {
    conn.query_row(
        "SELECT id, email, nome, ativo FROM usuarios WHERE email=?1",
        params![email.trim().to_lowercase()],
        user_from_row,
    )
    .optional()
    .storage("usuarios")
}

pub fn list_users(conn: &Connection) -> CoreResult<Vec<User>> {
    let mut stmt = conn
        .prepare("SELECT id, email, nome, ativo FROM usuarios ORDER BY email")
        .storage("usuarios")?;
    let rows = stmt.query_map([], user_from_row).storage("usuarios")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("usuarios")
}

/// Removes the user and, by cascade, everything they own.
pub fn remove_user(conn: &Connection, id: i64) -> CoreResult<()> {
    let n = conn
        .execute("DELETE FROM usuarios WHERE id=?1", params![id])
        .storage("usuarios")?;
    if n == 0 {
        return Err(CoreError::NotFound {
            entity: "user",
            id,
        });
    }
    tracing::info!(user = id, "user removed with all owned rows");
    Ok(())
}

// ---- categories ----

const CATEGORY_COLUMNS: &str = "id, user_id, nome, tipo, icone, ativo";

fn category_from_row(r: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: r.get(0)?,
        user_id: r.get(1)?,
        nome: r.get(2)?,
        tipo: r.get(3)?,
        icone: r.get(4)?,
        ativo: r.get(5)?,
    })
}

pub fn create_category(
    conn: &Connection,
    owner: i64,
    nome: &str,
    tipo: Kind,
    icone: Option<&str>,
) -> CoreResult<Category> {
    let nome = ensure_name("category name", nome)?;
    let icone = icone
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("📦")
        .to_string();
    conn.execute(
        "INSERT INTO categorias(user_id, nome, tipo, icone) VALUES (?1, ?2, ?3, ?4)",
        params![owner, nome, tipo, icone],
    )
    .storage("categorias (name must be unique per type)")?;
    Ok(Category {
        id: conn.last_insert_rowid(),
        user_id: owner,
        nome,
        tipo,
        icone,
        ativo: true,
    })
}

pub fn get_category(conn: &Connection, owner: i64, id: i64) -> CoreResult<Option<Category>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM categorias WHERE id=?1 AND user_id=?2",
            CATEGORY_COLUMNS
        ),
        params![id, owner],
        category_from_row,
    )
    .optional()
    .storage("categorias")
}

/// Looks a category up by name, preferring active rows.
pub fn find_category(conn: &Connection, owner: i64, nome: &str) -> CoreResult<Option<Category>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM categorias WHERE user_id=?1 AND nome=?2 ORDER BY ativo DESC, id LIMIT 1",
            CATEGORY_COLUMNS
        ),
        params![owner, nome.trim()],
        category_from_row,
    )
    .optional()
    .storage("categorias")
}

pub fn list_categories(
    conn: &Connection,
    owner: i64,
    tipo: Option<Kind>,
    include_inactive: bool,
) -> CoreResult<Vec<Category>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM categorias
             WHERE user_id=?1 AND (?2 IS NULL OR tipo=?2) AND (?3 OR ativo=1)
             ORDER BY nome",
            CATEGORY_COLUMNS
        ))
        .storage("categorias")?;
    let rows = stmt
        .query_map(params![owner, tipo, include_inactive], category_from_row)
        .storage("categorias")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("categorias")
}

pub fn deactivate_category(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    set_active(conn, "categorias", "category", owner, id, false)
}

pub fn remove_category(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    remove_owned(conn, "categorias", "category", owner, id)
}

const DEFAULT_EXPENSES: &[(&str, &str)] = &[
    ("Alimentação", "🍔"),
    ("Transporte", "🚗"),
    ("Moradia", "🏠"),
    ("Saúde", "💊"),
    ("Educação", "📚"),
    ("Lazer", "🎬"),
    ("Vestuário", "👕"),
    ("Serviços", "🔧"),
    ("Outros", "📦"),
];

const DEFAULT_INCOME: &[(&str, &str)] = &[
    ("Salário", "💰"),
    ("Freelance", "💻"),
    ("Investimentos", "📈"),
    ("Presente", "🎁"),
    ("Outros", "💵"),
];

/// Installs the default category set; existing names are left alone.
pub fn seed_default_categories(conn: &Connection, owner: i64) -> CoreResult<usize> {
    let mut stmt = conn
        .prepare(
            "INSERT OR IGNORE INTO categorias(user_id, nome, tipo, icone) VALUES (?1, ?2, ?3, ?4)",
        )
        .storage("categorias")?;
    let mut inserted = 0;
    for (tipo, set) in [(Kind::Expense, DEFAULT_EXPENSES), (Kind::Income, DEFAULT_INCOME)] {
        for (nome, icone) in set {
            inserted += stmt
                .execute(params![owner, nome, tipo, icone])
                .storage("categorias")?;
        }
    }
    Ok(inserted)
}

// ---- accounts ----

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub nome: String,
    pub tipo: AccountKind,
    pub saldo_inicial: Decimal,
    pub data_saldo_inicial: NaiveDate,
    pub dia_fechamento: Option<u32>,
    pub dia_vencimento: Option<u32>,
}

const ACCOUNT_COLUMNS: &str = "id, user_id, nome, tipo, saldo_inicial, data_saldo_inicial, dia_fechamento, dia_vencimento, ativo";

fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        user_id: r.get(1)?,
        nome: r.get(2)?,
        tipo: r.get(3)?,
        saldo_inicial: decimal_at(r, 4)?,
        data_saldo_inicial: r.get(5)?,
        dia_fechamento: r.get(6)?,
        dia_vencimento: r.get(7)?,
        ativo: r.get(8)?,
    })
}

pub fn create_account(conn: &Connection, owner: i64, new: NewAccount) -> CoreResult<Account> {
    let nome = ensure_name("account name", &new.nome)?;
    match new.tipo {
        AccountKind::CreditCard => {
            let closing = new.dia_fechamento.ok_or_else(|| {
                CoreError::validation("credit cards need a closing day")
            })?;
            let due = new
                .dia_vencimento
                .ok_or_else(|| CoreError::validation("credit cards need a due day"))?;
            ensure_day("closing day", closing)?;
            ensure_day("due day", due)?;
        }
        _ => {
            if new.dia_fechamento.is_some() || new.dia_vencimento.is_some() {
                return Err(CoreError::validation(
                    "closing and due days only apply to credit cards",
                ));
            }
        }
    }
    conn.execute(
        "INSERT INTO contas(user_id, nome, tipo, saldo_inicial, data_saldo_inicial, dia_fechamento, dia_vencimento)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            owner,
            nome,
            new.tipo,
            new.saldo_inicial.to_string(),
            new.data_saldo_inicial,
            new.dia_fechamento,
            new.dia_vencimento
        ],
    )
    .storage("contas (name must be unique)")?;
    Ok(Account {
        id: conn.last_insert_rowid(),
        user_id: owner,
        nome,
        tipo: new.tipo,
        saldo_inicial: new.saldo_inicial,
        data_saldo_inicial: new.data_saldo_inicial,
        dia_fechamento: new.dia_fechamento,
        dia_vencimento: new.dia_vencimento,
        ativo: true,
    })
}

pub fn get_account(conn: &Connection, owner: i64, id: i64) -> CoreResult<Option<Account>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM contas WHERE id=?1 AND user_id=?2",
            ACCOUNT_COLUMNS
        ),
        params![id, owner],
        account_from_row,
    )
    .optional()
    .storage("contas")
}

pub fn find_account(conn: &Connection, owner: i64, nome: &str) -> CoreResult<Option<Account>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM contas WHERE user_id=?1 AND nome=?2",
            ACCOUNT_COLUMNS
        ),
        params![owner, nome.trim()],
        account_from_row,
    )
    .optional()
    .storage("contas")
}

pub fn list_accounts(
    conn: &Connection,
    owner: i64,
    include_inactive: bool,
) -> CoreResult<Vec<Account>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM contas WHERE user_id=?1 AND (?2 OR ativo=1) ORDER BY nome",
            ACCOUNT_COLUMNS
        ))
        .storage("contas")?;
    let rows = stmt
        .query_map(params![owner, include_inactive], account_from_row)
        .storage("contas")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("contas")
}

pub fn deactivate_account(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    set_active(conn, "contas", "account", owner, id, false)
}

pub fn remove_account(conn: &Connection, owner: i64, id: i64) -> CoreResult<()> {
    remove_owned(conn, "contas", "account", owner, id)
}

/// Opening balance plus realized movements from the opening date up to `on`.
pub fn account_balance(
    conn: &Connection,
    owner: i64,
    account_id: i64,
    on: NaiveDate,
) -> CoreResult<Decimal> {
    let account = get_account(conn, owner, account_id)?.ok_or(CoreError::NotFound {
        entity: "account",
        id: account_id,
    })?;
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM transacoes
             WHERE user_id=?1 AND conta_id=?2 AND status='realizada' AND data>=?3 AND data<=?4",
            Transaction::COLUMNS
        ))
        .storage("transacoes")?;
    let rows = stmt
        .query_map(
            params![owner, account_id, account.data_saldo_inicial, on],
            Transaction::from_row,
        )
        .storage("transacoes")?;
    let mut balance = account.saldo_inicial;
    for t in rows {
        balance += t.storage("transacoes")?.signed();
    }
    Ok(balance)
}

// ---- recurring templates ----

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub conta_id: Option<i64>,
    pub categoria_id: Option<i64>,
    pub descricao: String,
    pub valor: Decimal,
    pub tipo: Kind,
    pub dia_do_mes: u32,
}

const TEMPLATE_COLUMNS: &str =
    "id, user_id, conta_id, categoria_id, descricao, valor, tipo, dia_do_mes, ativo";

fn template_from_row(r: &Row<'_>) -> rusqlite::Result<RecurringTemplate> {
    Ok(RecurringTemplate {
        id: r.get(0)?,
        user_id: r.get(1)?,
        conta_id: r.get(2)?,
        categoria_id: r.get(3)?,
        descricao: r.get(4)?,
        valor: decimal_at(r, 5)?,
        tipo: r.get(6)?,
        dia_do_mes: r.get(7)?,
        ativo: r.get(8)?,
    })
}

pub fn create_template(
    conn: &Connection,
    owner: i64,
    new: NewTemplate,
) -> CoreResult<RecurringTemplate> {
    ensure_positive("template amount", new.valor)?;
    ensure_day("day of month", new.dia_do_mes)?;
    let descricao = ensure_name("description", &new.descricao)?;
    if let Some(id) = new.conta_id {
        if !owned_row_exists(conn, "contas", owner, id)? {
            return Err(CoreError::NotFound {
                entity: "account",
                id,
            });
        }
    }
    if let Some(id) = new.categoria_id {
        if !owned_row_exists(conn, "categorias", owner, id)? {
            return Err(CoreError::NotFound {
                entity: "category",
                id,
            });
        }
    }
    conn.execute(
        "INSERT INTO transacoes_recorrentes(user_id, conta_id, categoria_id, descricao, valor, tipo, dia_do_mes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            owner,
            new.conta_id,
            new.categoria_id,
            descricao,
            new.valor.to_string(),
            new.tipo,
            new.dia_do_mes
        ],
    )
    .storage("transacoes_recorrentes")?;
    Ok(RecurringTemplate {
        id: conn.last_insert_rowid(),
        user_id: owner,
        conta_id: new.conta_id,
        categoria_id: new.categoria_id,
        descricao,
        valor: new.valor,
        tipo: new.tipo,
        dia_do_mes: new.dia_do_mes,
        ativo: true,
    })
}

pub fn get_template(
    conn: &Connection,
    owner: i64,
    id: i64,
) -> CoreResult<Option<RecurringTemplate>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM transacoes_recorrentes WHERE id=?1 AND user_id=?2",
            TEMPLATE_COLUMNS
        ),
        params![id, owner],
        template_from_row,
    )
    .optional()
    .storage("transacoes_recorrentes")
}

pub fn list_templates(
    conn: &Connection,
    owner: i64,
    include_inactive: bool,
) -> CoreResult<Vec<RecurringTemplate>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM transacoes_recorrentes WHERE user_id=?1 AND (?2 OR ativo=1)
             ORDER BY dia_do_mes, id",
            TEMPLATE_COLUMNS
        ))
        .storage("transacoes_recorrentes")?;
    let rows = stmt
        .query_map(params![owner, include_inactive], template_from_row)
        .storage("transacoes_recorrentes")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("transacoes_recorrentes")
}

/// Deactivation stops future projections; rows already generated stay.
pub fn set_template_active(
    conn: &Connection,
    owner: i64,
    id: i64,
    active: bool,
) -> CoreResult<()> {
    set_active(conn, "transacoes_recorrentes", "template", owner, id, active)
}
