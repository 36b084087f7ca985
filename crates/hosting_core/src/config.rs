//! Hosting directory layout and engine runtime settings
//!
//! The core consumes this plain configuration struct; loading it from a TOML
//! file (and applying CLI overrides) is the binary's job.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the hosting core.
///
/// All hosted content lives under a single base directory:
///
/// ```text
/// <root>/games/<key>         EasyRPG live directories
/// <root>/temp/<key>          per-key staging scratch
/// <root>/rtp                 shared read-only runtime resources (EasyRPG)
/// <root>/html/games/<key>    static HTML live directories
/// <root>/html/temp/<key>     HTML staging scratch
/// <root>/minetest/worlds     Minetest world directories
/// <root>/minetest/config     per-port server configs + port table
/// ```
#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// Base directory for all hosted content
    pub root: PathBuf,
    /// External index-generation tool settings (EasyRPG)
    pub index_tool: IndexToolConfig,
    /// Minetest server settings
    pub minetest: MinetestConfig,
}

/// External index-generation tool invoked against a staged EasyRPG tree.
///
/// The tool is expected to produce an `index.json` file inside the target
/// directory. A non-zero exit is an error in strict mode and a logged
/// warning otherwise.
#[derive(Debug, Clone)]
pub struct IndexToolConfig {
    /// Program path or name resolved via PATH
    pub program: PathBuf,
    /// Recursion depth passed to the tool
    pub depth: u32,
    /// Reject the deployment when the tool fails
    pub strict: bool,
}

/// Settings for supervised Minetest world servers.
#[derive(Debug, Clone)]
pub struct MinetestConfig {
    /// Server binary path or name resolved via PATH
    pub binary: PathBuf,
    /// Directory holding one subdirectory per world
    pub worlds_dir: PathBuf,
    /// Directory holding `config.<port>.conf` files and the port table
    pub config_dir: PathBuf,
    /// First port handed out; worlds get `base_port + offset`
    pub base_port: u16,
    /// How long a server may take to exit after a graceful interrupt
    /// before it is killed
    pub stop_timeout: Duration,
    /// Display name written into every per-port server config
    pub server_name: String,
}

impl HostingConfig {
    /// Create a configuration rooted at `root` with the standard layout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_tool: IndexToolConfig {
                program: PathBuf::from("genindex"),
                depth: 3,
                strict: false,
            },
            minetest: MinetestConfig {
                binary: PathBuf::from("minetest"),
                worlds_dir: root.join("minetest").join("worlds"),
                config_dir: root.join("minetest").join("config"),
                base_port: 30000,
                stop_timeout: Duration::from_secs(10),
                server_name: "w3itch".to_string(),
            },
            root,
        }
    }

    /// EasyRPG live directories
    pub fn games_dir(&self) -> PathBuf {
        self.root.join("games")
    }

    /// Staging scratch for EasyRPG and Minetest uploads
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Shared read-only runtime resources merged into EasyRPG games
    pub fn rtp_dir(&self) -> PathBuf {
        self.root.join("rtp")
    }

    /// Static HTML live directories
    pub fn html_games_dir(&self) -> PathBuf {
        self.root.join("html").join("games")
    }

    /// Staging scratch for HTML uploads
    pub fn html_temp_dir(&self) -> PathBuf {
        self.root.join("html").join("temp")
    }
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self::new("data")
    }
}
