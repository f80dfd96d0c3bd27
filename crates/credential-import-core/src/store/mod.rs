//! Storage abstraction for credential import.
//!
//! The [`CredentialStore`] trait is the only way the importer touches
//! persistent state, enabling pluggable backends (SQLite, in-memory).
//!
//! Each call is assumed atomic for a single record. Nothing spans a whole
//! import: a run that fails half-way leaves its earlier records in place.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Attributes, EntityKey, EntityKind, Handle};

/// Abstract credential store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_by_key`](CredentialStore::find_by_key) | Look up a record by its uniqueness key |
/// | [`create`](CredentialStore::create) | Insert a new record |
/// | [`count`](CredentialStore::count) | Number of stored records of one kind |
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Handle of the record whose key equals `key`, if any.
    async fn find_by_key(&self, key: &EntityKey) -> Result<Option<Handle>>;

    /// Insert a record and return its handle.
    ///
    /// Backends should reject a keyed record whose key already exists.
    async fn create(&self, attributes: &Attributes) -> Result<Handle>;

    async fn count(&self, kind: EntityKind) -> Result<u64>;
}
