// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Category suggestion for free-text descriptions (receipt items,
//! establishments, imported rows).

use regex::Regex;
use rusqlite::{Connection, params};

use crate::error::{CoreResult, StorageContext};
use crate::models::{Category, Kind};
use crate::store;

/// Default keyword table, keyed by default category name.
pub const DEFAULT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Alimentação",
        &[
            "supermercado", "mercado", "padaria", "restaurante", "lanchonete", "açougue",
            "hortifruti", "feira", "delivery", "ifood", "rappi", "carrefour", "pão de açúcar",
            "extra", "assaí", "atacadão",
        ],
    ),
    (
        "Transporte",
        &[
            "posto", "combustível", "gasolina", "etanol", "diesel", "uber", "99", "cabify",
            "estacionamento", "pedágio", "oficina", "ipva",
        ],
    ),
    (
        "Saúde",
        &[
            "farmácia", "drogaria", "hospital", "clínica", "laboratório", "droga", "raia",
            "drogasil", "pague menos", "ultrafarma",
        ],
    ),
    (
        "Vestuário",
        &[
            "loja", "roupa", "calçado", "sapato", "renner", "riachuelo", "c&a", "zara", "hering",
            "marisa",
        ],
    ),
    (
        "Lazer",
        &[
            "cinema", "teatro", "show", "ingresso", "netflix", "spotify", "amazon", "disney",
            "hbo", "streaming",
        ],
    ),
    (
        "Educação",
        &[
            "livraria", "livro", "curso", "escola", "faculdade", "udemy", "alura", "coursera",
        ],
    ),
    (
        "Serviços",
        &[
            "luz", "água", "internet", "telefone", "celular", "gás", "condomínio", "seguro",
            "banco",
        ],
    ),
];

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One strategy for mapping text to a category id.
pub trait CategoryMatcher {
    fn name(&self) -> &'static str;
    fn suggest(&self, text: &str) -> Option<i64>;
}

/// Text equal to a category name, ignoring case.
pub struct ExactName {
    names: Vec<(i64, String)>,
}

impl ExactName {
    pub fn new(categories: &[Category]) -> Self {
        Self {
            names: categories.iter().map(|c| (c.id, normalize(&c.nome))).collect(),
        }
    }
}

impl CategoryMatcher for ExactName {
    fn name(&self) -> &'static str {
        "exact_name"
    }

    fn suggest(&self, text: &str) -> Option<i64> {
        let text = normalize(text);
        self.names.iter().find(|(_, n)| *n == text).map(|(id, _)| *id)
    }
}

/// Text starting with a category name ("Transporte público" -> Transporte).
/// Longest name wins.
pub struct NamePrefix {
    names: Vec<(i64, String)>,
}

impl NamePrefix {
    pub fn new(categories: &[Category]) -> Self {
        let mut names: Vec<(i64, String)> =
            categories.iter().map(|c| (c.id, normalize(&c.nome))).collect();
        names.sort_by(|a, b| b.1.chars().count().cmp(&a.1.chars().count()));
        Self { names }
    }
}

impl CategoryMatcher for NamePrefix {
    fn name(&self) -> &'static str {
        "name_prefix"
    }

    fn suggest(&self, text: &str) -> Option<i64> {
        let text = normalize(text);
        self.names
            .iter()
            .filter(|(_, n)| !n.is_empty())
            .find(|(_, n)| text.starts_with(n.as_str()))
            .map(|(id, _)| *id)
    }
}

/// Substring match against a keyword table. Table entries whose category the
/// owner does not have are ignored.
pub struct Keywords {
    table: Vec<(i64, Vec<String>)>,
}

impl Keywords {
    pub fn new(categories: &[Category], table: &[(&str, &[&str])]) -> Self {
        let table = table
            .iter()
            .filter_map(|(cat, words)| {
                let cat = normalize(cat);
                categories
                    .iter()
                    .find(|c| normalize(&c.nome) == cat)
                    .map(|c| (c.id, words.iter().map(|w| normalize(w)).collect()))
            })
            .collect();
        Self { table }
    }

    pub fn with_defaults(categories: &[Category]) -> Self {
        Self::new(categories, DEFAULT_KEYWORDS)
    }
}

impl CategoryMatcher for Keywords {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn suggest(&self, text: &str) -> Option<i64> {
        let text = normalize(text);
        self.table
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w.as_str())))
            .map(|(id, _)| *id)
    }
}

/// User-defined regex rules from `regras`, newest first.
pub struct RegexRules {
    rules: Vec<(Regex, i64)>,
}

impl RegexRules {
    pub fn load(conn: &Connection, owner: i64) -> CoreResult<Self> {
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.pattern, r.categoria_id FROM regras r
                 JOIN categorias c ON c.id = r.categoria_id AND c.ativo = 1
                 WHERE r.user_id=?1 ORDER BY r.id DESC",
            )
            .storage("regras")?;
        let rows = stmt
            .query_map(params![owner], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
            })
            .storage("regras")?;
        let mut rules = Vec::new();
        for row in rows {
            let (id, pattern, categoria_id) = row.storage("regras")?;
            match Regex::new(&pattern) {
                Ok(re) => rules.push((re, categoria_id)),
                Err(err) => tracing::warn!(rule = id, %pattern, %err, "skipping invalid rule"),
            }
        }
        Ok(Self { rules })
    }
}

impl CategoryMatcher for RegexRules {
    fn name(&self) -> &'static str {
        "regex_rules"
    }

    fn suggest(&self, text: &str) -> Option<i64> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, id)| *id)
    }
}

/// Tries each matcher in order; the first hit wins.
#[derive(Default)]
pub struct Chain {
    matchers: Vec<Box<dyn CategoryMatcher>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, matcher: impl CategoryMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }
}

impl CategoryMatcher for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn suggest(&self, text: &str) -> Option<i64> {
        for m in &self.matchers {
            if let Some(id) = m.suggest(text) {
                tracing::debug!(matcher = m.name(), text, category = id, "category suggested");
                return Some(id);
            }
        }
        None
    }
}

/// Default chain over the owner's active expense categories and rules.
pub fn for_owner(conn: &Connection, owner: i64) -> CoreResult<Chain> {
    let categories = store::list_categories(conn, owner, Some(Kind::Expense), false)?;
    Ok(Chain::new()
        .with(ExactName::new(&categories))
        .with(NamePrefix::new(&categories))
        .with(Keywords::with_defaults(&categories))
        .with(RegexRules::load(conn, owner)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: i64, nome: &str) -> Category {
        Category {
            id,
            user_id: 1,
            nome: nome.to_string(),
            tipo: Kind::Expense,
            icone: String::new(),
            ativo: true,
        }
    }

    fn cats() -> Vec<Category> {
        vec![
            cat(1, "Alimentação"),
            cat(2, "Transporte"),
            cat(3, "Saúde"),
            cat(4, "Transporte Escolar"),
        ]
    }

    #[test]
    fn exact_name_ignores_case() {
        let m = ExactName::new(&cats());
        assert_eq!(m.suggest("  SAÚDE "), Some(3));
        assert_eq!(m.suggest("Saúde e bem-estar"), None);
    }

    #[test]
    fn prefix_prefers_longest_name() {
        let m = NamePrefix::new(&cats());
        assert_eq!(m.suggest("Transporte escolar março"), Some(4));
        assert_eq!(m.suggest("Transporte público"), Some(2));
        assert_eq!(m.suggest("Cinema"), None);
    }

    #[test]
    fn keywords_skip_missing_categories() {
        let m = Keywords::with_defaults(&cats());
        assert_eq!(m.suggest("PADARIA PÃO QUENTE"), Some(1));
        assert_eq!(m.suggest("Drogasil 123"), Some(3));
        // Lazer is not among the owner's categories.
        assert_eq!(m.suggest("Netflix.com"), None);
    }

    #[test]
    fn chain_stops_at_first_hit() {
        let c = cats();
        let chain = Chain::new()
            .with(ExactName::new(&c))
            .with(Keywords::with_defaults(&c));
        assert_eq!(chain.suggest("transporte"), Some(2));
        assert_eq!(chain.suggest("posto shell"), Some(2));
        assert_eq!(chain.suggest("xyz"), None);
    }
}
