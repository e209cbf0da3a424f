//! CLI configuration
//!
//! Settings come from an optional TOML file (`stakepool.toml` in the working
//! directory, or `--config PATH`), with command-line flags taking priority.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use stakepool::Address;

use crate::identity;

pub const DEFAULT_CONFIG_FILE: &str = "stakepool.toml";
pub const DEFAULT_STATE_PATH: &str = "~/.config/stakepool/state.json";
pub const DEFAULT_IDENTITY: &str = "owner";
pub const DEFAULT_SUPPLY: u128 = 1_000_000;

/// On-disk configuration; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub state_path: Option<String>,
    pub default_identity: Option<String>,
    pub default_supply: Option<u128>,
}

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub state_path: PathBuf,
    pub identity: String,
    pub default_supply: u128,
}

impl CliConfig {
    /// Merge file settings with command-line overrides
    ///
    /// An explicit `--config` that does not exist is an error; the implicit
    /// `stakepool.toml` is optional.
    pub fn new(
        config_path: Option<PathBuf>,
        state_path: Option<PathBuf>,
        identity: Option<String>,
    ) -> Result<Self> {
        let (file, config_path) = match config_path {
            Some(path) => (load_file(&path)?, Some(path)),
            None => {
                let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
                if implicit.exists() {
                    (load_file(&implicit)?, Some(implicit))
                } else {
                    (FileConfig::default(), None)
                }
            }
        };

        let state_path = match state_path {
            Some(path) => path,
            None => expand(file.state_path.as_deref().unwrap_or(DEFAULT_STATE_PATH))?,
        };

        let identity = identity
            .or(file.default_identity)
            .unwrap_or_else(|| DEFAULT_IDENTITY.to_string());

        Ok(Self {
            config_path,
            state_path,
            identity,
            default_supply: file.default_supply.unwrap_or(DEFAULT_SUPPLY),
        })
    }

    /// Address of the configured caller
    pub fn caller(&self) -> Result<Address> {
        identity::resolve_caller(&self.identity)
            .with_context(|| format!("Cannot act as '{}'", self.identity))
    }
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&data).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand state path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
