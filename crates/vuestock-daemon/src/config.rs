//! Configuration loading and validation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use vuestock_core::TableNames;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory holding the built web frontend
    #[serde(default = "default_web_root")]
    pub web_root: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            web_root: default_web_root(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_web_root() -> String {
    "web".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Table names served under `/rest/v1`
    #[serde(default)]
    pub tables: TableNames,
    /// TOML file with the racks, levels and slots to serve
    #[serde(default = "default_seed_path")]
    pub seed_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            seed_path: default_seed_path(),
        }
    }
}

fn default_seed_path() -> String {
    "warehouse.toml".to_string()
}

/// Load configuration from file, or defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Write the default configuration, refusing to overwrite an existing file
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Configuration file already exists: {}", path.display());
    }
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
