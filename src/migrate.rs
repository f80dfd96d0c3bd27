use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publics (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS privates (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(kind, data)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS realms (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(key, value)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cores (
            id TEXT PRIMARY KEY,
            public_id TEXT NOT NULL,
            private_id TEXT NOT NULL,
            realm_id TEXT,
            origin TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (public_id) REFERENCES publics(id),
            FOREIGN KEY (private_id) REFERENCES privates(id),
            FOREIGN KEY (realm_id) REFERENCES realms(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // NULL realm_id must collide with NULL, which a plain UNIQUE does not do
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_cores_triple ON cores(public_id, private_id, IFNULL(realm_id, ''))",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hosts (
            id TEXT PRIMARY KEY,
            address TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id TEXT PRIMARY KEY,
            host_id TEXT NOT NULL,
            port INTEGER NOT NULL,
            protocol TEXT NOT NULL,
            name TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(host_id, port, protocol),
            FOREIGN KEY (host_id) REFERENCES hosts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS logins (
            id TEXT PRIMARY KEY,
            core_id TEXT NOT NULL,
            service_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (core_id) REFERENCES cores(id),
            FOREIGN KEY (service_id) REFERENCES services(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logins_core_id ON logins(core_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_services_host_id ON services(host_id)")
        .execute(pool)
        .await?;

    Ok(())
}
