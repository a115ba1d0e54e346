// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Errors raised by the core.
//!
//! - [`Validation`] input rejected before any write.
//! - [`DuplicateProjection`] the (template, period) pair already has a row;
//!   batch callers treat it as success.
//! - [`ConflictingKnowledge`] a balance point with the same reference date and
//!   knowledge timestamp already exists.
//! - [`ReconciliationAtomicity`] the retire + insert pair could not complete and
//!   was rolled back.
//!
//! Soft referential gaps are not errors; see [`Warning`].
//!
//!  [`Validation`]: CoreError::Validation
//!  [`DuplicateProjection`]: CoreError::DuplicateProjection
//!  [`ConflictingKnowledge`]: CoreError::ConflictingKnowledge
//!  [`ReconciliationAtomicity`]: CoreError::ReconciliationAtomicity

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::models::Period;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Template {template_id} already has a transaction in {period}")]
    DuplicateProjection { template_id: i64, period: Period },
    #[error(
        "Investment {investment_id} already has a balance for {reference} known at {known_at}; resubmit with a later knowledge timestamp"
    )]
    ConflictingKnowledge {
        investment_id: i64,
        reference: NaiveDate,
        known_at: NaiveDateTime,
    },
    #[error("Reconciliation rolled back: {0}")]
    ReconciliationAtomicity(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Malformed JSON payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_duplicate_projection(&self) -> bool {
        matches!(self, Self::DuplicateProjection { .. })
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Storage {
            context: "database error".to_string(),
            source,
        }
    }
}

/// Attach the entity or constraint involved to a persistence error.
pub trait StorageContext<T> {
    fn storage(self, context: &str) -> CoreResult<T>;
}

impl<T> StorageContext<T> for Result<T, rusqlite::Error> {
    fn storage(self, context: &str) -> CoreResult<T> {
        self.map_err(|source| CoreError::Storage {
            context: context.to_string(),
            source,
        })
    }
}

/// True when SQLite rejected a write because of a UNIQUE constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Non-fatal conditions surfaced alongside a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A referenced category or account no longer exists; the reference was
    /// written as null.
    ReferentialGap { entity: &'static str, id: i64 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ReferentialGap { entity, id } => {
                write!(f, "{} {} no longer exists; stored without it", entity, id)
            }
        }
    }
}
