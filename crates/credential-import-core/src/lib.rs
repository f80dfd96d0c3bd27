//! # Credential Import Core
//!
//! Store-agnostic logic for importing credential CSV files: data models,
//! the rewindable CSV reader, header classification, two-tier validation,
//! dedup resolution, and the import orchestrator.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Persistence goes
//! through the [`store::CredentialStore`] trait.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─▶ reader ─▶ header (once) ─▶ validate (per row) ─▶ importer ─▶ resolve ─▶ store
//! ```

pub mod error;
pub mod header;
pub mod importer;
pub mod models;
pub mod reader;
pub mod resolve;
pub mod store;
pub mod validate;

pub use error::{ImportError, ReadError};
pub use importer::{CoreImporter, ImportOptions, ImportState, ImportSummary};
pub use validate::{ErrorKind, Field, ValidationReport};
