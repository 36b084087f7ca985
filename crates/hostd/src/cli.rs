//! Command-line argument parsing
//!
//! Defines the operator-facing interface of the hosting daemon using the
//! clap crate for argument handling.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the hosting daemon.
///
/// Global flags override configuration file settings; the subcommand selects
/// the operation to run.
#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-engine game hosting daemon", long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "hostd.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: HostCommand,
}

#[derive(Subcommand, Debug)]
pub enum HostCommand {
    /// Validate a game archive and deploy it to the live directory
    Deploy {
        /// Stable game slug the content is hosted under
        game_key: String,

        /// Target engine: easyrpg, minetest, html, or downloadable
        #[arg(short, long)]
        engine: String,

        /// Path to the zip archive to deploy
        archive: PathBuf,

        /// Legacy filename charset for old archives (e.g. Shift_JIS, GBK)
        #[arg(long)]
        charset: Option<String>,
    },

    /// Remove a game's live directory
    Delete {
        /// Stable game slug to remove
        game_key: String,

        /// Engine the game was deployed under
        #[arg(short, long)]
        engine: String,
    },

    /// Start every known world server and stay resident until shutdown
    Serve,
}
