// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Period;
use crate::projection;
use crate::reconcile::{self, LinkIssue};
use crate::utils::pretty_table;
use anyhow::Result;
use chrono::Local;
use rusqlite::Connection;

/// Issue rows as (kind, detail).
pub fn diagnose(conn: &Connection, owner: i64, today: chrono::NaiveDate) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();

    // 1) Broken projection/replacement links
    for issue in reconcile::check_links(conn, owner)? {
        let detail = match &issue {
            LinkIssue::OrphanReplaced { projected } => {
                format!("projection {} is replaced but nothing replaces it", projected)
            }
            LinkIssue::LiveTarget {
                realized,
                projected,
                status,
            } => format!("{} points at {} which is still {}", realized, projected, status),
            LinkIssue::UnrealizedReplacement {
                replacement,
                status,
            } => format!("replacement {} is {}", replacement, status),
            LinkIssue::TemplateMismatch {
                realized,
                projected,
                realized_template,
                projected_template,
            } => format!(
                "{} (template {}) replaces {} (template {})",
                realized, realized_template, projected, projected_template
            ),
            LinkIssue::PeriodMismatch {
                realized,
                projected,
                realized_on,
                projected_period,
            } => format!(
                "{} dated {} replaces {} of {}",
                realized, realized_on, projected, projected_period
            ),
        };
        let kind = serde_json::to_value(&issue)?
            .get("issue")
            .and_then(|v| v.as_str())
            .unwrap_or("link")
            .to_string();
        rows.push(vec![kind, detail]);
    }

    // 2) Projections of past months never matched
    for t in projection::stale_projections(conn, owner, Period::of(today))? {
        rows.push(vec![
            "stale_projection".into(),
            format!("{} {} '{}' {}", t.id, t.data, t.descricao, t.valor),
        ]);
    }
    Ok(rows)
}

pub fn handle(conn: &Connection, owner: i64) -> Result<()> {
    let rows = diagnose(conn, owner, Local::now().date_naive())?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
