//! Pass-through handler for downloadable-only games
//!
//! Nothing is validated, staged, or served: the uploaded file is recorded
//! as catalog metadata by the persistence layer outside this crate. The
//! handler exists purely to satisfy the uniform engine contract.

use super::{EngineHandler, UploadOutcome};
use crate::engine::Engine;
use crate::error::HostingResult;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DownloadableHandler;

impl DownloadableHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineHandler for DownloadableHandler {
    fn engine(&self) -> Engine {
        Engine::Downloadable
    }

    async fn upload_game(
        &self,
        game_key: &str,
        archive: Vec<u8>,
        _charset: Option<&str>,
    ) -> HostingResult<UploadOutcome> {
        debug!(game = game_key, size = archive.len(), "Downloadable upload recorded, nothing to host");
        Ok(UploadOutcome {
            engine: Engine::Downloadable,
            entry_root: None,
            server: None,
        })
    }

    async fn delete_game_directory(&self, _game_key: &str) -> HostingResult<()> {
        Ok(())
    }
}
