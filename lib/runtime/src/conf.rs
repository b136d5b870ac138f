//! Runtime configuration.
//!
//! Keys use the dotted names found in `hadoop-site.xml`, so a TOML file
//! looks like:
//!
//! ```toml
//! "fs.default.name" = "namenode.example.com:8020"
//! "dfs.replication" = 2
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Environment variable naming a TOML configuration file.
pub const CONF_ENV_VAR: &str = "HDFS_BRIDGE_CONF";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// `local` or `host:port`; what `connect("default", 0)` resolves to.
    #[serde(rename = "fs.default.name")]
    pub default_name: String,
    #[serde(rename = "io.file.buffer.size")]
    pub buffer_size: usize,
    #[serde(rename = "dfs.replication")]
    pub replication: u16,
    #[serde(rename = "dfs.block.size")]
    pub block_size: u64,
    #[serde(rename = "fs.local.block.size")]
    pub local_block_size: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            default_name: "local".to_string(),
            buffer_size: 4096,
            replication: 3,
            block_size: 64 * 1024 * 1024,
            local_block_size: 32 * 1024 * 1024,
        }
    }
}

impl Configuration {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load the file named by [`CONF_ENV_VAR`], falling back to the
    /// defaults when it is unset or unusable.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONF_ENV_VAR) else {
            return Self::default();
        };
        match Self::from_file(Path::new(&path)) {
            Ok(conf) => {
                tracing::debug!(path = ?path, "loaded configuration");
                conf
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring configuration, using defaults");
                Self::default()
            }
        }
    }

    /// `hint` if non-zero, else the configured buffer size.
    pub fn buffer_size_or_default(&self, hint: usize) -> usize {
        if hint == 0 { self.buffer_size } else { hint }
    }

    pub fn replication_or_default(&self, hint: u16) -> u16 {
        if hint == 0 { self.replication } else { hint }
    }

    pub fn block_size_or_default(&self, hint: u64) -> u64 {
        if hint == 0 { self.block_size } else { hint }
    }
}
