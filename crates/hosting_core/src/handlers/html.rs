//! Static HTML game hosting

use super::{EngineHandler, UploadOutcome};
use crate::archive;
use crate::config::HostingConfig;
use crate::engine::Engine;
use crate::error::HostingResult;
use crate::staging;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// The single marker locating an HTML game's content root.
pub const MARKER: &str = "index.html";

pub struct HtmlHandler {
    config: Arc<HostingConfig>,
}

impl HtmlHandler {
    pub fn new(config: Arc<HostingConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineHandler for HtmlHandler {
    fn engine(&self) -> Engine {
        Engine::Html
    }

    async fn upload_game(
        &self,
        game_key: &str,
        archive: Vec<u8>,
        charset: Option<&str>,
    ) -> HostingResult<UploadOutcome> {
        let (entries, root) = archive::validate(&archive, &[MARKER], charset)?;
        info!(game = game_key, root = %root, "Validated HTML archive");

        staging::deploy_to_live(
            archive,
            entries,
            &root,
            &self.config.html_temp_dir().join(game_key),
            &self.config.html_games_dir().join(game_key),
            None,
        )
        .await?;

        Ok(UploadOutcome {
            engine: Engine::Html,
            entry_root: Some(root.as_str().to_string()),
            server: None,
        })
    }

    async fn delete_game_directory(&self, game_key: &str) -> HostingResult<()> {
        staging::delete_live(&self.config.html_games_dir().join(game_key)).await?;
        Ok(())
    }
}
