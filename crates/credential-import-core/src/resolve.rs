//! Dedup resolver.
//!
//! Decides, for one candidate record, whether an equivalent record already
//! exists or must be created. Lookups consult an explicit in-run memo first
//! and the store second, so a value repeated across rows of the same file
//! is created at most once even when the store has not caught up.
//!
//! A resolver lives for exactly one import run; its memo is dropped with it.

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::debug;

use crate::models::{Attributes, EntityCounts, EntityKey, Handle};
use crate::store::CredentialStore;

pub struct DedupResolver<'s> {
    store: &'s dyn CredentialStore,
    memo: HashMap<EntityKey, Handle>,
    created: EntityCounts,
}

impl<'s> DedupResolver<'s> {
    pub fn new(store: &'s dyn CredentialStore) -> Self {
        Self {
            store,
            memo: HashMap::new(),
            created: EntityCounts::default(),
        }
    }

    /// Return the handle of an equivalent record, creating one if needed.
    ///
    /// The boolean is `true` when the record was created by this call.
    ///
    /// # Errors
    ///
    /// Fails for unkeyed candidates (logins, see [`create`](Self::create))
    /// and whenever the store fails.
    pub async fn resolve_or_create(&mut self, candidate: &Attributes) -> Result<(Handle, bool)> {
        let key = match candidate.key() {
            Some(key) => key,
            None => bail!("{} records have no uniqueness key", candidate.kind()),
        };

        if let Some(handle) = self.memo.get(&key) {
            return Ok((handle.clone(), false));
        }

        if let Some(handle) = self.store.find_by_key(&key).await? {
            self.memo.insert(key, handle.clone());
            return Ok((handle, false));
        }

        let handle = self.store.create(candidate).await?;
        debug!(kind = %candidate.kind(), handle = %handle, "created record");
        self.created.record(candidate.kind());
        self.memo.insert(key, handle.clone());
        Ok((handle, true))
    }

    /// Create a record unconditionally, without any dedup.
    pub async fn create(&mut self, attributes: &Attributes) -> Result<Handle> {
        let handle = self.store.create(attributes).await?;
        debug!(kind = %attributes.kind(), handle = %handle, "created record");
        self.created.record(attributes.kind());
        Ok(handle)
    }

    /// Records created through this resolver so far.
    pub fn created(&self) -> &EntityCounts {
        &self.created
    }

    pub fn into_created(self) -> EntityCounts {
        self.created
    }
}
