//! Server configuration.
//!
//! Loaded from an optional TOML file; every field has a default and the CLI
//! can override each one.
//!
//! ```toml
//! bind_addr = "127.0.0.1:27117"
//! database = "test"
//! seed = "fixtures/seed.json"
//! mount = "collections"
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

use docfs_kernel::collections::DEFAULT_MOUNT;

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_DATABASE, DEFAULT_PORT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid mount name {0:?}: must be a single path component")]
    InvalidMount(String),

    #[error("database name must not be empty")]
    EmptyDatabase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Logical database name.
    pub database: String,
    /// JSON file of `{ "<collection>": [documents] }` loaded at startup.
    pub seed: Option<PathBuf>,
    /// Name of the namespace directory under `/`.
    pub mount: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ip: IpAddr = DEFAULT_BIND_ADDRESS
            .parse()
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));
        Self {
            bind_addr: SocketAddr::new(ip, DEFAULT_PORT),
            database: DEFAULT_DATABASE.to_string(),
            seed: None,
            mount: DEFAULT_MOUNT.to_string(),
        }
    }
}

impl ServerConfig {
    /// Config on an OS-assigned localhost port (for testing).
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Self::default()
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mount = self.mount.as_str();
        if mount.is_empty() || mount == "." || mount == ".." || mount.contains('/') {
            return Err(ConfigError::InvalidMount(self.mount.clone()));
        }
        if self.database.is_empty() {
            return Err(ConfigError::EmptyDatabase);
        }
        Ok(())
    }
}
