//! EasyRPG-compatible static resource hosting
//!
//! RPG Maker 2000/2003 game data served through the EasyRPG web player.
//! Deployment merges the shared runtime-resource directory into games that
//! do not bundle their own assets and generates the resource index the
//! player fetches at startup.

use super::{EngineHandler, UploadOutcome};
use crate::archive;
use crate::config::HostingConfig;
use crate::engine::Engine;
use crate::error::HostingResult;
use crate::staging::{self, RuntimePackage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Marker files every RPG Maker 2000/2003 data directory carries. All three
/// must resolve to the same entry root.
pub const MARKERS: [&str; 3] = ["RPG_RT.lmt", "RPG_RT.ldb", "RPG_RT.ini"];

pub struct EasyRpgHandler {
    config: Arc<HostingConfig>,
}

impl EasyRpgHandler {
    pub fn new(config: Arc<HostingConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineHandler for EasyRpgHandler {
    fn engine(&self) -> Engine {
        Engine::EasyRpg
    }

    async fn upload_game(
        &self,
        game_key: &str,
        archive: Vec<u8>,
        charset: Option<&str>,
    ) -> HostingResult<UploadOutcome> {
        let (entries, root) = archive::validate(&archive, &MARKERS, charset)?;
        info!(game = game_key, root = %root, "Validated EasyRPG archive");

        let rtp_dir = self.config.rtp_dir();
        staging::deploy_to_live(
            archive,
            entries,
            &root,
            &self.config.temp_dir().join(game_key),
            &self.config.games_dir().join(game_key),
            Some(RuntimePackage {
                rtp_dir: &rtp_dir,
                index_tool: &self.config.index_tool,
            }),
        )
        .await?;

        Ok(UploadOutcome {
            engine: Engine::EasyRpg,
            entry_root: Some(root.as_str().to_string()),
            server: None,
        })
    }

    async fn delete_game_directory(&self, game_key: &str) -> HostingResult<()> {
        staging::delete_live(&self.config.games_dir().join(game_key)).await?;
        Ok(())
    }
}
