//! Configuration file handling
//!
//! Loads daemon settings from a TOML file, creating a default file on first
//! run, and converts them into the plain configuration struct the hosting
//! core consumes.

use anyhow::Result;
use hosting_core::HostingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Root configuration object, serialized to/from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub hosting: HostingSettings,
    pub minetest: MinetestSettings,
    pub index: IndexSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingSettings {
    /// Base directory for all hosted content
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinetestSettings {
    /// Server binary path or name resolved via PATH
    pub binary: String,
    /// First port handed out to worlds
    pub base_port: u16,
    /// Seconds a server may take to exit after a graceful interrupt
    pub stop_timeout_secs: u64,
    /// Display name written into every per-port server config
    pub server_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// External index-generation tool (EasyRPG deployments)
    pub tool: String,
    /// Recursion depth passed to the tool
    pub depth: u32,
    /// Reject deployments when the tool fails
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter: trace, debug, info, warn, error
    pub level: String,
    /// JSON-formatted log output
    pub json_format: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosting: HostingSettings {
                root: "data".to_string(),
            },
            minetest: MinetestSettings {
                binary: "minetest".to_string(),
                base_port: 30000,
                stop_timeout_secs: 10,
                server_name: "w3itch".to_string(),
            },
            index: IndexSettings {
                tool: "genindex".to_string(),
                depth: 3,
                strict: false,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.hosting.root.is_empty() {
            return Err("Hosting root cannot be empty".to_string());
        }
        if self.minetest.base_port == 0 {
            return Err("Minetest base port must be non-zero".to_string());
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }
        Ok(())
    }

    /// Convert to the plain config struct consumed by the hosting core.
    pub fn to_hosting_config(&self) -> HostingConfig {
        let mut config = HostingConfig::new(PathBuf::from(&self.hosting.root));
        config.minetest.binary = PathBuf::from(&self.minetest.binary);
        config.minetest.base_port = self.minetest.base_port;
        config.minetest.stop_timeout = Duration::from_secs(self.minetest.stop_timeout_secs);
        config.minetest.server_name = self.minetest.server_name.clone();
        config.index_tool.program = PathBuf::from(&self.index.tool);
        config.index_tool.depth = self.index.depth;
        config.index_tool.strict = self.index.strict;
        config
    }
}

/// Load settings from file or create a default configuration file.
pub async fn load_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        let contents = tokio::fs::read_to_string(path).await?;
        match toml::from_str::<Settings>(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    } else {
        warn!(
            "Configuration file not found: {}, using defaults",
            path.display()
        );
        let settings = Settings::default();
        let contents = toml::to_string_pretty(&settings)?;
        tokio::fs::write(path, contents).await?;
        info!("Created default configuration file: {}", path.display());
        Ok(settings)
    }
}
