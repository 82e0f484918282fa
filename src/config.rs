//! Settings file (`config.toml`)
//!
//! Every field is optional; missing fields take their defaults. Command
//! line flags override what is configured here.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError, io_error};
use crate::shred::DEFAULT_PASSES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Overwrite passes per shredded file
    pub passes: u32,

    /// Worker threads for batches; 0 picks one per CPU
    pub threads: usize,

    /// Ask before shredding
    pub confirm: bool,

    /// Keep a persistent activity log
    pub activity_log: bool,

    /// Where the activity log is written
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            passes: DEFAULT_PASSES,
            threads: 0,
            confirm: true,
            activity_log: true,
            log_file: default_log_path(),
        }
    }
}

/// `~/.config/vaultburn/config.toml` or the platform equivalent
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("vaultburn"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// `~/.local/share/vaultburn/activity.log` or the platform equivalent
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vaultburn"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("activity.log")
}

impl Config {
    /// Parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            io_error(path, "read config file", e).with_context("cannot load configuration")
        })?;
        Self::parse(&content)
            .map_err(|e| e.with_context(format!("invalid config file {}", path.display())))
    }

    /// Loads `explicit` if given (it must exist), otherwise the default
    /// path if it exists, otherwise the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = default_config_path();
        match fs::metadata(&path) {
            Ok(_) => Self::load(&path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(io_error(&path, "stat", e)),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("cannot parse config: {}", e.message()),
                e,
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.passes == 0 {
            return Err(VaultburnError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidPasses,
                "passes must be at least 1",
            ));
        }
        Ok(())
    }
}
