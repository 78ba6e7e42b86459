use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub dispatch: DispatchConfig,
    pub lifecycle: LifecycleConfig,
}

/// Sizing of the background side-effect queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Effects waiting to run. Enqueueing beyond this drops the effect with an error log.
    pub queue_capacity: usize,
    /// Effects executing at the same time.
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Color given to tags created implicitly from a lead's tag list.
    pub default_tag_color: String,
    /// Plan assigned to customers created by conversion when the caller names none.
    pub default_customer_plan: String,
}

impl ServerConfig {
    /// Reads a TOML file. Missing keys fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| Error::Config(e.to_string()))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("leadline.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            dispatch: DispatchConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 16,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_tag_color: "#6B7280".to_string(),
            default_customer_plan: "BASIC".to_string(),
        }
    }
}
