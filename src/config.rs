// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use crate::{db, store};

const DEFAULT_FILTER: &str = "caderneta=warn";

/// Process-wide settings. Flags win over `CADERNETA_*` variables (clap reads
/// those), which win over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub user: Option<String>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn from_matches(m: &ArgMatches) -> Result<Self> {
        let db_path = match m.get_one::<String>("db").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(p) => PathBuf::from(p),
            None => db::default_db_path()?,
        };
        Ok(Self {
            db_path,
            user: m
                .get_one::<String>("user")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            log_level: m
                .get_one::<String>("log_level")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }

    /// Resolves `--user` (an email) to the owner id every core call takes.
    pub fn owner(&self, conn: &Connection) -> Result<i64> {
        let email = self
            .user
            .as_deref()
            .ok_or_else(|| anyhow!("No user selected; pass --user <email> or set CADERNETA_USER"))?;
        let user = store::find_user(conn, email)?
            .with_context(|| format!("User '{}' not found; create it with 'user add'", email))?;
        Ok(user.id)
    }
}

/// Filter directive for a `--log-level` value: a bare level applies to this
/// crate only, anything else is passed through as a full directive.
pub fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("caderneta={}", level)
    }
}

/// Installs the stderr subscriber. `RUST_LOG` is used when no level was given.
pub fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(filter_directive(l)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_levels_are_scoped_to_the_crate() {
        assert_eq!(filter_directive("debug"), "caderneta=debug");
        assert_eq!(filter_directive("rusqlite=info,caderneta=trace"), "rusqlite=info,caderneta=trace");
    }
}
