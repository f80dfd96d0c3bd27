//! # Credential Import
//!
//! Imports credential CSV files into a SQLite credential database.
//!
//! The format rules, validation and dedup logic live in
//! [`credential_import_core`]; this crate adds the SQLite store, TOML
//! configuration and the `credimport` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! credimport init                                   # create database
//! credimport validate creds.csv                     # check a file, write nothing
//! credimport import creds.csv --private-type ntlm_hash
//! credimport stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `CredentialStore` |
//! | [`ingest`] | `validate` and `import` commands |
//! | [`stats`] | Record counts |

pub mod config;
pub mod db;
pub mod ingest;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;
