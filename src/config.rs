//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/credentials.sqlite"
//!
//! [import]
//! private_credential_type = "password"
//! login_status = "Untried"
//! origin_from_filename = true
//! ```
//!
//! The `[import]` table is optional; every key in it has a default.

use anyhow::{Context, Result};
use credential_import_core::models::{LoginStatus, PrivateKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Default private type for short-form files.
    #[serde(default)]
    pub private_credential_type: Option<String>,
    #[serde(default = "default_login_status")]
    pub login_status: String,
    #[serde(default = "default_origin_from_filename")]
    pub origin_from_filename: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            private_credential_type: None,
            login_status: default_login_status(),
            origin_from_filename: default_origin_from_filename(),
        }
    }
}

fn default_login_status() -> String {
    "Untried".to_string()
}
fn default_origin_from_filename() -> bool {
    true
}

impl ImportConfig {
    /// Parsed default login status. Checked by [`load_config`].
    pub fn login_status(&self) -> LoginStatus {
        self.login_status.parse().unwrap_or_default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if let Some(tag) = &config.import.private_credential_type {
        if PrivateKind::from_tag(tag).is_none() {
            anyhow::bail!(
                "import.private_credential_type '{}' is not one of: password, ntlm_hash, nonreplayable_hash, ssh_key, blank",
                tag
            );
        }
    }

    if let Err(e) = config.import.login_status.parse::<LoginStatus>() {
        anyhow::bail!("import.login_status: {}", e);
    }

    Ok(config)
}
