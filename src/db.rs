//! Connection pool for the credential database.
//!
//! Every connection runs in WAL mode with foreign keys switched on. The
//! schema links cores to publics, privates and realms, and logins to cores
//! and services; SQLite only checks those references when `foreign_keys` is
//! set per connection, so a pool without it would accept a login pointing at
//! a core that does not exist.
//!
//! Two `credimport import` runs may hit the same file at once. The busy
//! timeout makes the second writer wait instead of failing immediately; a
//! real conflict then surfaces as a unique-constraint error.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the database named by `[db] path`.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open credential database: {}", db_path.display()))?;

    Ok(pool)
}
