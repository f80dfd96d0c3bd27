//! Import and validate commands.
//!
//! Wires a CSV file on disk, the configured SQLite database and the core
//! [`CoreImporter`] together, and prints a summary the way the rest of the
//! CLI does: one `key: value` line per fact, `ok` on success.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use credential_import_core::header::HeaderShape;
use credential_import_core::models::EntityKind;
use credential_import_core::reader::TabularReader;
use credential_import_core::validate;
use credential_import_core::{CoreImporter, ImportError, ImportOptions, ValidationReport};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Merge CLI overrides with the `[import]` config section.
pub fn import_options(
    config: &Config,
    path: &Path,
    private_type: Option<String>,
    origin: Option<String>,
) -> ImportOptions {
    let origin = origin.or_else(|| {
        if config.import.origin_from_filename {
            path.file_name().map(|n| n.to_string_lossy().into_owned())
        } else {
            None
        }
    });

    ImportOptions {
        private_credential_type: private_type
            .or_else(|| config.import.private_credential_type.clone()),
        origin,
        default_login_status: config.import.login_status(),
    }
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open import file: {}", path.display()))
}

fn shape_label(shape: Option<HeaderShape>) -> &'static str {
    match shape {
        Some(HeaderShape::ShortForm) => "short-form",
        Some(HeaderShape::LongForm {
            service_binding: true,
        }) => "long-form (with services)",
        Some(HeaderShape::LongForm {
            service_binding: false,
        }) => "long-form",
        Some(HeaderShape::Unrecognized) => "unrecognized",
        None => "none",
    }
}

fn print_report(report: &ValidationReport) {
    println!("  shape: {}", shape_label(report.shape));
    println!("  rows: {}", report.rows);
    for error in &report.errors {
        println!("  error: {}", error);
    }
    for issue in &report.row_issues {
        println!("  skip: {}", issue);
    }
}

/// Validate a file without touching the database.
pub async fn run_validate(
    config: &Config,
    path: &Path,
    private_type: Option<String>,
    json: bool,
) -> Result<()> {
    let options = import_options(config, path, private_type, None);
    let mut reader = TabularReader::new(open_input(path)?);
    let report = validate::validate(&mut reader, options.private_credential_type.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("validate {}", path.display());
        print_report(&report);
    }

    if !report.is_valid() {
        bail!("{} is not valid: {}", path.display(), report.error_keys().join(", "));
    }
    if !json {
        println!("ok");
    }
    Ok(())
}

/// Validate and import a file into the configured database.
pub async fn run_import(
    config: &Config,
    path: &Path,
    private_type: Option<String>,
    origin: Option<String>,
) -> Result<()> {
    let options = import_options(config, path, private_type, origin);
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let mut importer = CoreImporter::new(open_input(path)?, store, options);

    info!(path = %path.display(), "starting import");
    println!("import {}", path.display());

    let result = importer.import().await;
    pool.close().await;

    let summary = match result {
        Ok(summary) => summary,
        Err(ImportError::Invalid(report)) => {
            print_report(&report);
            bail!("{} is not valid: {}", path.display(), report.error_keys().join(", "));
        }
        Err(ImportError::Store {
            line,
            created,
            cause,
        }) => {
            for kind in EntityKind::ALL {
                println!("  created {}: {}", kind, created.get(kind));
            }
            return Err(cause.context(format!(
                "import aborted at line {}; records created before it were kept",
                line
            )));
        }
        Err(e) => return Err(e.into()),
    };

    println!("  imported rows: {}", summary.rows_imported);
    println!("  skipped rows: {}", summary.rows_skipped.len());
    for issue in &summary.rows_skipped {
        println!("  skip: {}", issue);
    }
    for kind in EntityKind::ALL {
        println!("  created {}: {}", kind, summary.created.get(kind));
    }
    println!("ok");

    Ok(())
}
