//! SQLite-backed [`CredentialStore`] implementation.
//!
//! One table per record kind (see [`migrate`](crate::migrate)). Uniqueness
//! keys are enforced by UNIQUE constraints as well, so two imports racing
//! on the same database end in a reported conflict rather than a duplicate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use credential_import_core::models::{Attributes, EntityKey, EntityKind, Handle};
use credential_import_core::store::CredentialStore;

/// SQLite implementation of the [`CredentialStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Public => "publics",
        EntityKind::Private => "privates",
        EntityKind::Realm => "realms",
        EntityKind::Core => "cores",
        EntityKind::Host => "hosts",
        EntityKind::Service => "services",
        EntityKind::Login => "logins",
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_by_key(&self, key: &EntityKey) -> Result<Option<Handle>> {
        let id = match key {
            EntityKey::Public { username } => {
                sqlx::query_scalar::<_, String>("SELECT id FROM publics WHERE username = ?")
                    .bind(username)
                    .fetch_optional(&self.pool)
                    .await?
            }
            EntityKey::Private { kind, data } => {
                sqlx::query_scalar::<_, String>(
                    "SELECT id FROM privates WHERE kind = ? AND data = ?",
                )
                .bind(kind.tag())
                .bind(data)
                .fetch_optional(&self.pool)
                .await?
            }
            EntityKey::Realm { key, value } => {
                sqlx::query_scalar::<_, String>("SELECT id FROM realms WHERE key = ? AND value = ?")
                    .bind(key)
                    .bind(value)
                    .fetch_optional(&self.pool)
                    .await?
            }
            EntityKey::Core {
                public,
                private,
                realm,
            } => {
                sqlx::query_scalar::<_, String>(
                    "SELECT id FROM cores WHERE public_id = ? AND private_id = ? AND realm_id IS ?",
                )
                .bind(public.as_str())
                .bind(private.as_str())
                .bind(realm.as_ref().map(Handle::as_str))
                .fetch_optional(&self.pool)
                .await?
            }
            EntityKey::Host { address } => {
                sqlx::query_scalar::<_, String>("SELECT id FROM hosts WHERE address = ?")
                    .bind(address)
                    .fetch_optional(&self.pool)
                    .await?
            }
            EntityKey::Service {
                host,
                port,
                protocol,
            } => {
                sqlx::query_scalar::<_, String>(
                    "SELECT id FROM services WHERE host_id = ? AND port = ? AND protocol = ?",
                )
                .bind(host.as_str())
                .bind(i64::from(*port))
                .bind(protocol.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(id.map(Handle::from))
    }

    async fn create(&self, attributes: &Attributes) -> Result<Handle> {
        let handle = Handle::generate();
        let now = chrono::Utc::now().timestamp();

        match attributes {
            Attributes::Public { username } => {
                sqlx::query("INSERT INTO publics (id, username, created_at) VALUES (?, ?, ?)")
                    .bind(handle.as_str())
                    .bind(username)
                    .bind(now)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to create public '{}'", username))?;
            }
            Attributes::Private { kind, data } => {
                sqlx::query(
                    "INSERT INTO privates (id, kind, data, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(handle.as_str())
                .bind(kind.tag())
                .bind(data)
                .bind(now)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create {} private", kind))?;
            }
            Attributes::Realm { key, value } => {
                sqlx::query("INSERT INTO realms (id, key, value, created_at) VALUES (?, ?, ?, ?)")
                    .bind(handle.as_str())
                    .bind(key)
                    .bind(value)
                    .bind(now)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to create realm {}={}", key, value))?;
            }
            Attributes::Core {
                public,
                private,
                realm,
                origin,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO cores (id, public_id, private_id, realm_id, origin, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(handle.as_str())
                .bind(public.as_str())
                .bind(private.as_str())
                .bind(realm.as_ref().map(Handle::as_str))
                .bind(origin.as_deref())
                .bind(now)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create core for public {}", public))?;
            }
            Attributes::Host { address } => {
                sqlx::query("INSERT INTO hosts (id, address, created_at) VALUES (?, ?, ?)")
                    .bind(handle.as_str())
                    .bind(address)
                    .bind(now)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to create host {}", address))?;
            }
            Attributes::Service {
                host,
                port,
                protocol,
                name,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO services (id, host_id, port, protocol, name, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(handle.as_str())
                .bind(host.as_str())
                .bind(i64::from(*port))
                .bind(protocol.as_str())
                .bind(name.as_deref())
                .bind(now)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create service {}/{}", port, protocol))?;
            }
            Attributes::Login {
                core,
                service,
                status,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO logins (id, core_id, service_id, status, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(handle.as_str())
                .bind(core.as_str())
                .bind(service.as_str())
                .bind(status.as_str())
                .bind(now)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create login for core {}", core))?;
            }
        }

        Ok(handle)
    }

    async fn count(&self, kind: EntityKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table_name(kind));
        let n: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(n as u64)
    }
}
