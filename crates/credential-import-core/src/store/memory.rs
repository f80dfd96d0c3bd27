//! In-memory [`CredentialStore`] implementation for testing.
//!
//! Keeps every record in a `Vec` behind `std::sync::RwLock` and a key index
//! in a `HashMap`. Keyed records are unique: creating a duplicate key is an
//! error, the same way a unique constraint fails in SQLite.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Attributes, EntityKey, EntityKind, Handle};

use super::CredentialStore;

struct StoredRecord {
    handle: Handle,
    attributes: Attributes,
}

/// In-memory store for tests and dry runs.
pub struct InMemoryStore {
    records: RwLock<Vec<StoredRecord>>,
    index: RwLock<HashMap<EntityKey, Handle>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Attributes of every stored record of one kind, in creation order.
    pub fn records(&self, kind: EntityKind) -> Vec<(Handle, Attributes)> {
        let records = self.records.read().unwrap();
        records
            .iter()
            .filter(|r| r.attributes.kind() == kind)
            .map(|r| (r.handle.clone(), r.attributes.clone()))
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_key(&self, key: &EntityKey) -> Result<Option<Handle>> {
        let index = self.index.read().map_err(|_| anyhow!("store index poisoned"))?;
        Ok(index.get(key).cloned())
    }

    async fn create(&self, attributes: &Attributes) -> Result<Handle> {
        let handle = Handle::generate();
        if let Some(key) = attributes.key() {
            let mut index = self.index.write().map_err(|_| anyhow!("store index poisoned"))?;
            if index.contains_key(&key) {
                bail!("unique constraint failed for {}", key.kind());
            }
            index.insert(key, handle.clone());
        }
        let mut records = self.records.write().map_err(|_| anyhow!("store poisoned"))?;
        records.push(StoredRecord {
            handle: handle.clone(),
            attributes: attributes.clone(),
        });
        Ok(handle)
    }

    async fn count(&self, kind: EntityKind) -> Result<u64> {
        let records = self.records.read().map_err(|_| anyhow!("store poisoned"))?;
        Ok(records.iter().filter(|r| r.attributes.kind() == kind).count() as u64)
    }
}
