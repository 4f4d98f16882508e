//! Project configuration file
//!
//! Read from `.fqcn.yml` in the working directory or from `--config PATH`.
//! Every field is optional; command-line flags override file values.
//!
//! ```yaml
//! mapping_file: mappings.yml
//! mappings:
//!   deploy_app: acme.apps.deploy
//! workers: 8
//! backup: true
//! backup_suffix: .orig
//! strict: false
//! include: ["site.yml", "roles"]
//! exclude: ["legacy"]
//! continue_on_error: true
//! tie_break: structural_fit
//! ```

use anyhow::{Context, Result};
use fqcn_core::TieBreak;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default file name looked up in the working directory
pub(crate) const DEFAULT_CONFIG_FILE: &str = ".fqcn.yml";

/// Settings read from the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    /// Extra mappings layered over the defaults and the mapping file
    pub(crate) mappings: BTreeMap<String, String>,
    /// Mapping file, relative to the config file
    pub(crate) mapping_file: Option<PathBuf>,
    /// Worker count for directory runs
    pub(crate) workers: Option<usize>,
    /// Write backups before replacing files
    pub(crate) backup: Option<bool>,
    /// Backup file suffix
    pub(crate) backup_suffix: Option<String>,
    /// Strict validation
    pub(crate) strict: Option<bool>,
    /// Project marker patterns
    pub(crate) include: Vec<String>,
    /// Exclude patterns
    pub(crate) exclude: Vec<String>,
    /// Keep going after a file fails
    pub(crate) continue_on_error: Option<bool>,
    /// Analyzer tie-break rule
    pub(crate) tie_break: Option<TieBreak>,
}

impl CliConfig {
    /// Load the explicit config, or the default file when present
    ///
    /// An explicit path must exist; the default file is optional.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("invalid config file {}", path.display()))?
        };

        if let (Some(file), Some(dir)) = (config.mapping_file.as_mut(), path.parent()) {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}
