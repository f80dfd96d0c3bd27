//! Database statistics.
//!
//! Record counts per kind plus a per-origin breakdown of credential cores,
//! so an operator can see what each imported file contributed.

use anyhow::Result;
use sqlx::Row;

use credential_import_core::models::EntityKind;
use credential_import_core::store::CredentialStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

struct OriginStats {
    origin: String,
    core_count: i64,
    last_import_ts: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Credential Import: Database Stats");
    println!("=================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();

    for kind in EntityKind::ALL {
        let n = store.count(kind).await?;
        println!("  {:<12} {}", format!("{}s:", kind), n);
    }

    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(origin, '(none)') AS origin,
            COUNT(*) AS core_count,
            MAX(created_at) AS last_import_ts
        FROM cores
        GROUP BY origin
        ORDER BY core_count DESC
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let origins: Vec<OriginStats> = rows
        .iter()
        .map(|row| OriginStats {
            origin: row.get("origin"),
            core_count: row.get("core_count"),
            last_import_ts: row.get("last_import_ts"),
        })
        .collect();

    if !origins.is_empty() {
        println!();
        println!("  By origin:");
        println!("  {:<32} {:>6}   {}", "ORIGIN", "CORES", "LAST IMPORT");
        println!("  {}", "-".repeat(60));
        for o in &origins {
            println!(
                "  {:<32} {:>6}   {}",
                o.origin,
                o.core_count,
                format_ts_iso(o.last_import_ts)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
