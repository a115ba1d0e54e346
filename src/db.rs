// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("br.caderneta", "Caderneta", "caderneta"));

/// Default database location in the platform data dir.
pub fn default_db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("caderneta.sqlite"))
}

pub fn open_or_init(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Create data dir {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Open in-memory DB")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS usuarios(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        nome TEXT NOT NULL,
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS categorias(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        nome TEXT NOT NULL,
        tipo TEXT NOT NULL CHECK(tipo IN ('receita','despesa')),
        icone TEXT NOT NULL DEFAULT '📦',
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, nome, tipo),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS contas(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        nome TEXT NOT NULL,
        tipo TEXT NOT NULL CHECK(tipo IN ('corrente','poupanca','carteira','cartao_credito')),
        saldo_inicial TEXT NOT NULL DEFAULT '0',
        data_saldo_inicial TEXT NOT NULL DEFAULT (date('now')),
        dia_fechamento INTEGER CHECK(dia_fechamento BETWEEN 1 AND 31),
        dia_vencimento INTEGER CHECK(dia_vencimento BETWEEN 1 AND 31),
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, nome),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS transacoes_recorrentes(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        conta_id INTEGER,
        categoria_id INTEGER,
        descricao TEXT NOT NULL,
        valor TEXT NOT NULL,
        tipo TEXT NOT NULL CHECK(tipo IN ('receita','despesa')),
        dia_do_mes INTEGER NOT NULL CHECK(dia_do_mes BETWEEN 1 AND 31),
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(conta_id) REFERENCES contas(id) ON DELETE SET NULL,
        FOREIGN KEY(categoria_id) REFERENCES categorias(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS transacoes(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        conta_id INTEGER,
        categoria_id INTEGER,
        descricao TEXT NOT NULL,
        valor TEXT NOT NULL,
        tipo TEXT NOT NULL CHECK(tipo IN ('receita','despesa')),
        data TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'realizada'
            CHECK(status IN ('realizada','prevista','substituida')),
        modo_lancamento TEXT NOT NULL DEFAULT 'manual'
            CHECK(modo_lancamento IN ('manual','automatico','semi_automatico')),
        recorrente_id INTEGER,
        transacao_prevista_id INTEGER,
        competencia TEXT, -- YYYY-MM, only on rows generated from a template
        observacao TEXT,
        id_externo TEXT, -- bank statement id (OFX FITID)
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(conta_id) REFERENCES contas(id) ON DELETE SET NULL,
        FOREIGN KEY(categoria_id) REFERENCES categorias(id) ON DELETE SET NULL,
        FOREIGN KEY(recorrente_id) REFERENCES transacoes_recorrentes(id) ON DELETE SET NULL,
        FOREIGN KEY(transacao_prevista_id) REFERENCES transacoes(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transacoes_user_data ON transacoes(user_id, data);
    CREATE INDEX IF NOT EXISTS idx_transacoes_recorrente ON transacoes(recorrente_id, data);
    CREATE INDEX IF NOT EXISTS idx_transacoes_prevista ON transacoes(transacao_prevista_id);
    -- one projection per (template, month); backstop for concurrent generators
    CREATE UNIQUE INDEX IF NOT EXISTS ux_transacoes_projecao
        ON transacoes(recorrente_id, competencia) WHERE competencia IS NOT NULL;

    CREATE TABLE IF NOT EXISTS itens_transacao(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transacao_id INTEGER NOT NULL,
        descricao TEXT NOT NULL,
        quantidade TEXT NOT NULL,
        valor_unitario TEXT NOT NULL,
        valor_total TEXT NOT NULL,
        categoria_sugerida_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(transacao_id) REFERENCES transacoes(id) ON DELETE CASCADE,
        FOREIGN KEY(categoria_sugerida_id) REFERENCES categorias(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS recibos_pendentes(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        conta_id INTEGER,
        payload TEXT NOT NULL, -- receipt as JSON
        status TEXT NOT NULL DEFAULT 'pendente'
            CHECK(status IN ('pendente','processado','descartado')),
        transacao_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(conta_id) REFERENCES contas(id) ON DELETE SET NULL,
        FOREIGN KEY(transacao_id) REFERENCES transacoes(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS orcamentos(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        categoria_id INTEGER NOT NULL,
        valor_limite TEXT NOT NULL,
        periodo TEXT NOT NULL DEFAULT 'mensal' CHECK(periodo IN ('mensal')),
        natureza TEXT NOT NULL DEFAULT 'teto' CHECK(natureza IN ('teto','meta')),
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, categoria_id),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(categoria_id) REFERENCES categorias(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS investimentos(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        nome TEXT NOT NULL,
        ativo INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, nome),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE
    );

    -- bitemporal: identity includes the knowledge timestamp
    CREATE TABLE IF NOT EXISTS investimentos_saldos(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        investimento_id INTEGER NOT NULL,
        data_referencia TEXT NOT NULL,
        data_conhecido_em TEXT NOT NULL,
        saldo TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(investimento_id, data_referencia, data_conhecido_em),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(investimento_id) REFERENCES investimentos(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_saldos_ref
        ON investimentos_saldos(investimento_id, data_referencia, data_conhecido_em);

    -- bills to pay or receive; paying one records a realized transaction
    CREATE TABLE IF NOT EXISTS contas_pagaveis(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        descricao TEXT NOT NULL,
        valor TEXT NOT NULL,
        tipo TEXT NOT NULL CHECK(tipo IN ('pagar','receber')),
        data_vencimento TEXT NOT NULL,
        categoria_id INTEGER,
        conta_id INTEGER,
        forma_pagamento TEXT NOT NULL DEFAULT 'outro'
            CHECK(forma_pagamento IN ('cartao','pix','debito','dinheiro','transferencia','outro')),
        pago INTEGER NOT NULL DEFAULT 0,
        data_pagamento TEXT,
        transacao_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(categoria_id) REFERENCES categorias(id) ON DELETE SET NULL,
        FOREIGN KEY(conta_id) REFERENCES contas(id) ON DELETE SET NULL,
        FOREIGN KEY(transacao_id) REFERENCES transacoes(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_contas_pagaveis_venc
        ON contas_pagaveis(user_id, pago, data_vencimento);

    -- Selic target rate (% a.a.) by publication date
    CREATE TABLE IF NOT EXISTS taxas_selic(
        data TEXT PRIMARY KEY,
        valor_aa TEXT NOT NULL,
        obtido_em TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS regras(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        pattern TEXT NOT NULL,
        categoria_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES usuarios(id) ON DELETE CASCADE,
        FOREIGN KEY(categoria_id) REFERENCES categorias(id) ON DELETE SET NULL
    );
    "#,
    )?;
    add_column_if_missing(conn, "transacoes", "id_externo", "TEXT")?;
    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_transacoes_externo
             ON transacoes(user_id, id_externo) WHERE id_externo IS NOT NULL;",
    )?;
    for table in [
        "usuarios",
        "categorias",
        "contas",
        "transacoes_recorrentes",
        "transacoes",
        "itens_transacao",
        "recibos_pendentes",
        "orcamentos",
        "investimentos",
        "investimentos_saldos",
        "regras",
        "contas_pagaveis",
    ] {
        conn.execute_batch(&format!(
            "CREATE TRIGGER IF NOT EXISTS trg_{t}_updated_at AFTER UPDATE ON {t}
             FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
             BEGIN
                 UPDATE {t} SET updated_at = datetime('now') WHERE id = NEW.id;
             END;",
            t = table
        ))?;
    }
    Ok(())
}

/// Upgrades databases created before `column` existed.
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let present: bool = conn.query_row(
        &format!("SELECT COUNT(*) > 0 FROM pragma_table_info('{}') WHERE name=?1", table),
        [column],
        |r| r.get(0),
    )?;
    if !present {
        conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))?;
        tracing::info!(table, column, "column added");
    }
    Ok(())
}
