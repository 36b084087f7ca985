//! Minetest world hosting
//!
//! A deployed world is more than files: after staging, the world descriptor
//! and the per-port server config are rewritten with generated values, and
//! the supervised server process for the world's port is (re)started.
//! Staging happens-before config materialization happens-before the
//! restart, because the descriptor lives inside the staged tree.

use super::{EngineHandler, ServerStatus, UploadOutcome};
use crate::archive;
use crate::config::HostingConfig;
use crate::engine::Engine;
use crate::error::{ConfigResult, HostingResult};
use crate::properties::{self, PortConfig, WorldConfig};
use crate::staging;
use crate::supervisor::MinetestSupervisor;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Subgame identifier written into every deployed world descriptor.
const GAME_ID: &str = "minetest";
/// Storage backend applied to map, player, and auth data.
const STORAGE_BACKEND: &str = "sqlite3";

pub struct MinetestHandler {
    config: Arc<HostingConfig>,
    supervisor: Arc<MinetestSupervisor>,
}

impl MinetestHandler {
    /// Build the handler, restoring persisted port bindings.
    pub async fn new(config: Arc<HostingConfig>) -> ConfigResult<Self> {
        let supervisor = Arc::new(MinetestSupervisor::new(config.minetest.clone()).await?);
        Ok(Self { config, supervisor })
    }

    pub fn supervisor(&self) -> &MinetestSupervisor {
        &self.supervisor
    }

    /// Start every world with a persisted port binding. Used at daemon
    /// startup; individual failures are logged and skipped so one broken
    /// world cannot keep the rest offline.
    pub async fn start_known_worlds(&self) {
        for (world, port) in self.supervisor.known_worlds().await {
            match self.supervisor.start(&world, port).await {
                Ok(()) => {}
                Err(e) => warn!(world = %world, port, error = %e, "Failed to start world server"),
            }
        }
    }

    fn world_dir(&self, game_key: &str) -> std::path::PathBuf {
        self.config.minetest.worlds_dir.join(game_key)
    }
}

#[async_trait]
impl EngineHandler for MinetestHandler {
    fn engine(&self) -> Engine {
        Engine::Minetest
    }

    async fn upload_game(
        &self,
        game_key: &str,
        archive: Vec<u8>,
        charset: Option<&str>,
    ) -> HostingResult<UploadOutcome> {
        let (entries, root) = archive::validate(&archive, &[properties::WORLD_FILE], charset)?;
        info!(world = game_key, root = %root, "Validated world archive");

        let world_dir = self.world_dir(game_key);
        staging::deploy_to_live(
            archive,
            entries,
            &root,
            &self.config.temp_dir().join(game_key),
            &world_dir,
            None,
        )
        .await?;

        properties::apply_world_config(
            &world_dir,
            &WorldConfig {
                game_id: GAME_ID,
                world_name: game_key,
                backend: STORAGE_BACKEND,
            },
        )
        .await?;

        let port = self.supervisor.get_or_assign_port(game_key).await?;
        properties::apply_port_config(
            &self.config.minetest.config_dir,
            port,
            &PortConfig {
                name: &self.config.minetest.server_name,
            },
        )
        .await?;

        // A restart failure is logged and reported as a warning status; the
        // deployment itself already succeeded once the files are in place.
        let server = match self.supervisor.start(game_key, port).await {
            Ok(()) => ServerStatus::Running { port },
            Err(e) => {
                warn!(world = game_key, port, error = %e, "World deployed but its server could not be restarted");
                ServerStatus::RestartFailed {
                    port,
                    reason: e.to_string(),
                }
            }
        };

        Ok(UploadOutcome {
            engine: Engine::Minetest,
            entry_root: Some(root.as_str().to_string()),
            server: Some(server),
        })
    }

    async fn delete_game_directory(&self, game_key: &str) -> HostingResult<()> {
        // Stop the world's server first. Its port stays reserved forever;
        // a later world never inherits it.
        if let Some(port) = self.supervisor.port_of(game_key).await {
            if let Err(e) = self.supervisor.stop(port).await {
                warn!(world = game_key, port, error = %e, "Failed to stop world server before delete");
            }
        }
        staging::delete_live(&self.world_dir(game_key)).await?;
        Ok(())
    }
}
