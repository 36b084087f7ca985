//! Engine identifiers
//!
//! The set of supported runtime engines is small and fixed, so engines are a
//! closed sum type rather than an open plugin registry. Dispatch over the
//! variants lives in [`crate::handlers::EngineRegistry`].

use crate::error::HostingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The runtime engine an uploaded game targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// EasyRPG-compatible static resource games (RPG Maker 2000/2003 data)
    EasyRpg,
    /// Minetest worlds served by a supervised server subprocess
    Minetest,
    /// Plain static HTML games
    Html,
    /// Opaque downloadable files; no hosting, catalog metadata only
    Downloadable,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::EasyRpg,
        Engine::Minetest,
        Engine::Html,
        Engine::Downloadable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::EasyRpg => "easyrpg",
            Engine::Minetest => "minetest",
            Engine::Html => "html",
            Engine::Downloadable => "downloadable",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = HostingError;

    /// Unknown identifiers fail with a descriptive error rather than
    /// silently defaulting to any handler.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easyrpg" => Ok(Engine::EasyRpg),
            "minetest" => Ok(Engine::Minetest),
            "html" => Ok(Engine::Html),
            "downloadable" => Ok(Engine::Downloadable),
            other => Err(HostingError::UnsupportedEngine(other.to_string())),
        }
    }
}
