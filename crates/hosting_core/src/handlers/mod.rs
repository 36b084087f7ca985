//! Engine handlers
//!
//! Every supported engine implements the same capability contract: validate
//! an uploaded archive, stage it into the live serving tree, and (for the
//! sandbox engine) activate a runtime process. The set of engines is fixed,
//! so dispatch is a total match over a closed registry rather than any kind
//! of dynamic discovery.

pub mod downloadable;
pub mod easy_rpg;
pub mod html;
pub mod minetest;

pub use downloadable::DownloadableHandler;
pub use easy_rpg::EasyRpgHandler;
pub use html::HtmlHandler;
pub use minetest::MinetestHandler;

use crate::config::HostingConfig;
use crate::engine::Engine;
use crate::error::{ConfigResult, HostingResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub engine: Engine,
    /// Prefix inside the archive where content started; `None` when the
    /// engine skips validation entirely
    pub entry_root: Option<String>,
    /// World-server state after deployment (sandbox engine only)
    pub server: Option<ServerStatus>,
}

/// State of the supervised world server after a sandbox deployment.
///
/// A failed restart does not fail the upload (the deployment is complete
/// once the files are in place) but it is surfaced here as a distinct
/// status rather than only a log line.
#[derive(Debug, Clone)]
pub enum ServerStatus {
    Running { port: u16 },
    RestartFailed { port: u16, reason: String },
}

/// Uniform capability contract implemented by every engine handler.
#[async_trait]
pub trait EngineHandler: Send + Sync {
    fn engine(&self) -> Engine;

    /// Validate, stage, and (where applicable) activate an uploaded archive.
    ///
    /// Validation failures surface before any filesystem mutation and list
    /// every missing marker at once.
    async fn upload_game(
        &self,
        game_key: &str,
        archive: Vec<u8>,
        charset: Option<&str>,
    ) -> HostingResult<UploadOutcome>;

    /// Remove the live directory for a game. Idempotent; a missing
    /// directory is not an error.
    async fn delete_game_directory(&self, game_key: &str) -> HostingResult<()>;
}

/// Fixed dispatch table mapping each engine to its handler.
pub struct EngineRegistry {
    easy_rpg: EasyRpgHandler,
    minetest: MinetestHandler,
    html: HtmlHandler,
    downloadable: DownloadableHandler,
}

impl EngineRegistry {
    /// Build the registry. Restores the sandbox supervisor's persisted port
    /// bindings, hence async and fallible.
    pub async fn new(config: HostingConfig) -> ConfigResult<Self> {
        let config = Arc::new(config);
        Ok(Self {
            easy_rpg: EasyRpgHandler::new(Arc::clone(&config)),
            minetest: MinetestHandler::new(Arc::clone(&config)).await?,
            html: HtmlHandler::new(Arc::clone(&config)),
            downloadable: DownloadableHandler::new(),
        })
    }

    pub fn handler(&self, engine: Engine) -> &dyn EngineHandler {
        match engine {
            Engine::EasyRpg => &self.easy_rpg,
            Engine::Minetest => &self.minetest,
            Engine::Html => &self.html,
            Engine::Downloadable => &self.downloadable,
        }
    }

    /// The sandbox handler, exposed for resident serve mode and shutdown.
    pub fn minetest(&self) -> &MinetestHandler {
        &self.minetest
    }

    pub async fn upload(
        &self,
        engine: Engine,
        game_key: &str,
        archive: Vec<u8>,
        charset: Option<&str>,
    ) -> HostingResult<UploadOutcome> {
        self.handler(engine)
            .upload_game(game_key, archive, charset)
            .await
    }

    pub async fn delete(&self, engine: Engine, game_key: &str) -> HostingResult<()> {
        self.handler(engine).delete_game_directory(game_key).await
    }
}
