//! Properties-file materialization
//!
//! Minetest consumes two flat `key = value` files: the `world.mt` descriptor
//! embedded in each world directory and a per-port server config
//! (`config.<port>.conf`). Both are external mutable state: every access
//! reopens the file, generated values are injected into a fixed key set, and
//! every other line, comments and unknown keys included, is written back
//! untouched. Write-back goes through a temp file and an atomic rename.

use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// World descriptor filename inside every Minetest world directory.
pub const WORLD_FILE: &str = "world.mt";

/// Values injected into a world descriptor on deployment.
#[derive(Debug, Clone)]
pub struct WorldConfig<'a> {
    /// Subgame identifier the server loads for this world
    pub game_id: &'a str,
    pub world_name: &'a str,
    /// Storage backend identifier applied to map, player, and auth data
    pub backend: &'a str,
}

/// Values injected into a per-port server config.
#[derive(Debug, Clone)]
pub struct PortConfig<'a> {
    /// Display name advertised by the server
    pub name: &'a str,
}

/// Line-preserving view of a properties file.
#[derive(Debug)]
pub struct PropertiesFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl PropertiesFile {
    /// Load a properties file; a missing file yields an empty one that
    /// `save` will create.
    pub async fn load_or_default(path: &Path) -> ConfigResult<Self> {
        let lines = match fs::read_to_string(path).await {
            Ok(contents) => contents.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    /// Current value of a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|line| parse_pair(line).filter(|(k, _)| *k == key))
            .map(|(_, value)| value)
    }

    /// Set a key, replacing its existing line or appending a new one.
    /// All other lines are left byte-for-byte unchanged.
    pub fn set(&mut self, key: &str, value: impl AsRef<str>) {
        let rendered = format!("{key} = {}", value.as_ref());
        for line in &mut self.lines {
            if parse_pair(line).is_some_and(|(k, _)| k == key) {
                *line = rendered;
                return;
            }
        }
        self.lines.push(rendered);
    }

    /// Write the file back via temp file + atomic rename.
    pub async fn save(&self) -> ConfigResult<()> {
        let mut contents = self.lines.join("\n");
        contents.push('\n');
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, contents)
            .await
            .map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ConfigError::Replace(self.path.clone(), e))?;
        debug!(path = %self.path.display(), "Wrote properties file");
        Ok(())
    }
}

fn parse_pair(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Inject generated values into a world's `world.mt`, preserving every
/// unrelated key.
pub async fn apply_world_config(world_dir: &Path, config: &WorldConfig<'_>) -> ConfigResult<()> {
    let path = world_dir.join(WORLD_FILE);
    let mut props = PropertiesFile::load_or_default(&path).await?;
    props.set("gameid", config.game_id);
    props.set("world_name", config.world_name);
    props.set("backend", config.backend);
    props.set("player_backend", config.backend);
    props.set("auth_backend", config.backend);
    props.save().await
}

/// Path of the per-port server config inside the engine config directory.
pub fn port_config_path(config_dir: &Path, port: u16) -> PathBuf {
    config_dir.join(format!("config.{port}.conf"))
}

/// Create or update the per-port server config, injecting the port number
/// and display name while leaving other keys untouched.
pub async fn apply_port_config(
    config_dir: &Path,
    port: u16,
    config: &PortConfig<'_>,
) -> ConfigResult<PathBuf> {
    fs::create_dir_all(config_dir)
        .await
        .map_err(|e| ConfigError::Write(config_dir.to_path_buf(), e))?;
    let path = port_config_path(config_dir, port);
    let mut props = PropertiesFile::load_or_default(&path).await?;
    props.set("port", port.to_string());
    props.set("name", config.name);
    props.save().await?;
    Ok(path)
}
