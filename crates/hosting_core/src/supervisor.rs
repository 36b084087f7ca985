//! Minetest world-server supervision
//!
//! Owns two tables: world name → port (durable, monotonic, never reused) and
//! port → running process. Each port's lifecycle runs under its own async
//! mutex held across the whole stop → await-exit → spawn sequence, so two
//! concurrent uploads for the same world cannot both observe "no existing
//! handle" and leak an orphan process bound to the port.
//!
//! Port bindings are persisted to `ports.json` inside the engine config
//! directory and restored on construction: a host restart keeps every
//! world on the port its players know.

use crate::config::MinetestConfig;
use crate::error::{ConfigError, ConfigResult, ProcessError, ProcessResult};
use crate::properties;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Durable world → port table, stored beside the per-port server configs.
pub const PORT_TABLE_FILE: &str = "ports.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PortAssignments {
    /// World name → assigned port
    worlds: HashMap<String, u16>,
    /// Total ports ever handed out. Monotonic; deleting a world does not
    /// free its offset, so a port is never rebound to a different world.
    assigned: u64,
}

#[derive(Debug)]
struct PortTable {
    path: PathBuf,
    state: PortAssignments,
}

impl PortTable {
    async fn load(path: PathBuf) -> ConfigResult<Self> {
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ConfigError::PortTable(path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PortAssignments::default(),
            Err(e) => return Err(ConfigError::Read(path.clone(), e)),
        };
        Ok(Self { path, state })
    }

    async fn save(&self) -> ConfigResult<()> {
        let json = serde_json::to_vec_pretty(&self.state)
            .map_err(|e| ConfigError::PortTable(self.path.clone(), e))?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ConfigError::Replace(self.path.clone(), e))?;
        Ok(())
    }
}

/// One supervised process. Exactly one per port at any time; replaced, not
/// merged, on redeploy.
#[derive(Debug)]
struct RunningServer {
    pid: u32,
    /// Guards against the exit watcher of a replaced process clearing the
    /// replacement's handle.
    generation: u64,
    exit_rx: oneshot::Receiver<std::process::ExitStatus>,
}

#[derive(Debug, Default)]
struct PortSlot {
    running: Option<RunningServer>,
    next_generation: u64,
}

/// Supervisor for Minetest world servers.
pub struct MinetestSupervisor {
    config: MinetestConfig,
    ports: Mutex<PortTable>,
    servers: Arc<DashMap<u16, Arc<Mutex<PortSlot>>>>,
}

impl MinetestSupervisor {
    /// Create a supervisor, restoring any persisted port bindings.
    pub async fn new(config: MinetestConfig) -> ConfigResult<Self> {
        tokio::fs::create_dir_all(&config.config_dir)
            .await
            .map_err(|e| ConfigError::Write(config.config_dir.clone(), e))?;
        let table = PortTable::load(config.config_dir.join(PORT_TABLE_FILE)).await?;
        if !table.state.worlds.is_empty() {
            info!(worlds = table.state.worlds.len(), "Restored world port bindings");
        }
        Ok(Self {
            config,
            ports: Mutex::new(table),
            servers: Arc::new(DashMap::new()),
        })
    }

    /// Look up a world's port, assigning and persisting the next free one on
    /// first deployment. Once assigned, a world's port never changes.
    pub async fn get_or_assign_port(&self, world_name: &str) -> ConfigResult<u16> {
        let mut table = self.ports.lock().await;
        if let Some(port) = table.state.worlds.get(world_name) {
            return Ok(*port);
        }
        let offset = table.state.assigned;
        let candidate = u32::from(self.config.base_port) + u32::try_from(offset).unwrap_or(u32::MAX);
        let port = u16::try_from(candidate).map_err(|_| ConfigError::PortRangeExhausted {
            base: self.config.base_port,
            assigned: offset,
        })?;
        table.state.worlds.insert(world_name.to_string(), port);
        table.state.assigned += 1;
        table.save().await?;
        info!(world = world_name, port, "Assigned world server port");
        Ok(port)
    }

    /// The port bound to a world, if one was ever assigned.
    pub async fn port_of(&self, world_name: &str) -> Option<u16> {
        self.ports.lock().await.state.worlds.get(world_name).copied()
    }

    /// All persisted world → port bindings, ordered by port.
    pub async fn known_worlds(&self) -> Vec<(String, u16)> {
        let table = self.ports.lock().await;
        let mut worlds: Vec<(String, u16)> = table
            .state
            .worlds
            .iter()
            .map(|(world, port)| (world.clone(), *port))
            .collect();
        worlds.sort_by_key(|(_, port)| *port);
        worlds
    }

    /// Start (or restart) the server for a world on its port.
    ///
    /// When a process is already bound to the port it is interrupted
    /// gracefully and its exit awaited (with a bounded timeout and kill
    /// escalation) before the replacement spawns. The per-port lock is held
    /// across the whole sequence.
    pub async fn start(&self, world_name: &str, port: u16) -> ProcessResult<()> {
        let slot_arc = Arc::clone(
            self.servers
                .entry(port)
                .or_insert_with(|| Arc::new(Mutex::new(PortSlot::default())))
                .value(),
        );
        let mut slot = slot_arc.lock().await;

        if let Some(previous) = slot.running.take() {
            info!(world = world_name, port, pid = previous.pid, "Stopping previous server before redeploy");
            self.await_exit(port, previous).await?;
        }

        let config_path = properties::port_config_path(&self.config.config_dir, port);
        let mut child = Command::new(&self.config.binary)
            .arg("--server")
            .arg("--worldname")
            .arg(world_name)
            .arg("--config")
            .arg(&config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessError::Spawn {
                binary: self.config.binary.clone(),
                source: e,
            })?;

        let pid = child.id().unwrap_or_default();
        let generation = slot.next_generation;
        slot.next_generation += 1;

        if let Some(stdout) = child.stdout.take() {
            drain_output(stdout, world_name.to_string(), port, false);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_output(stderr, world_name.to_string(), port, true);
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        slot.running = Some(RunningServer {
            pid,
            generation,
            exit_rx,
        });

        let watcher_slot = Arc::clone(&slot_arc);
        let world = world_name.to_string();
        tokio::spawn(async move {
            let status = child.wait().await;
            match &status {
                Ok(status) => info!(world = %world, port, %status, "World server exited"),
                Err(e) => warn!(world = %world, port, error = %e, "Failed to observe server exit"),
            }
            // Deliver the exit signal before taking the slot lock: a
            // redeploy in progress holds the lock while awaiting it.
            if let Ok(status) = status {
                let _ = exit_tx.send(status);
            }
            let mut slot = watcher_slot.lock().await;
            if slot
                .running
                .as_ref()
                .is_some_and(|running| running.generation == generation)
            {
                slot.running = None;
            }
        });

        info!(world = world_name, port, pid, "World server started");
        Ok(())
    }

    /// Gracefully stop the server on a port. No-op when nothing runs there.
    pub async fn stop(&self, port: u16) -> ProcessResult<()> {
        let slot = match self.servers.get(&port) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Ok(()),
        };
        let mut slot = slot.lock().await;
        if let Some(previous) = slot.running.take() {
            self.await_exit(port, previous).await?;
        }
        Ok(())
    }

    /// Stop every supervised server; used on daemon shutdown.
    pub async fn stop_all(&self) {
        let ports: Vec<u16> = self.servers.iter().map(|entry| *entry.key()).collect();
        let stops = ports.into_iter().map(|port| async move {
            if let Err(e) = self.stop(port).await {
                warn!(port, error = %e, "Failed to stop world server");
            }
        });
        join_all(stops).await;
    }

    /// Whether a server process is currently bound to the port.
    pub async fn is_running(&self, port: u16) -> bool {
        let slot = match self.servers.get(&port) {
            Some(entry) => Arc::clone(entry.value()),
            None => return false,
        };
        let slot = slot.lock().await;
        slot.running.is_some()
    }

    /// Interrupt a process and await its recorded exit, escalating to a
    /// kill when the graceful window elapses.
    async fn await_exit(&self, port: u16, mut previous: RunningServer) -> ProcessResult<()> {
        send_interrupt(previous.pid, port)?;
        if timeout(self.config.stop_timeout, &mut previous.exit_rx)
            .await
            .is_ok()
        {
            return Ok(());
        }
        warn!(port, pid = previous.pid, "Server ignored interrupt, killing");
        send_kill(previous.pid, port)?;
        match timeout(self.config.stop_timeout, &mut previous.exit_rx).await {
            Ok(_) => Ok(()),
            Err(_) => Err(ProcessError::StopTimeout(port, self.config.stop_timeout)),
        }
    }
}

fn drain_output<R>(reader: R, world: String, port: u16, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(world = %world, port, "{line}");
            } else {
                debug!(world = %world, port, "{line}");
            }
        }
    });
}

/// SIGTERM lets the server save the world before exiting.
#[cfg(unix)]
fn send_interrupt(pid: u32, port: u16) -> ProcessResult<()> {
    send_signal(pid, port, libc::SIGTERM)
}

#[cfg(unix)]
fn send_kill(pid: u32, port: u16) -> ProcessResult<()> {
    send_signal(pid, port, libc::SIGKILL)
}

#[cfg(unix)]
fn send_signal(pid: u32, port: u16, signal: i32) -> ProcessResult<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    // Already gone; the exit watcher resolves the handle.
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(ProcessError::Signal {
        port,
        reason: err.to_string(),
    })
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32, port: u16) -> ProcessResult<()> {
    Err(ProcessError::Signal {
        port,
        reason: "graceful interrupt is not supported on this platform".to_string(),
    })
}

#[cfg(not(unix))]
fn send_kill(_pid: u32, port: u16) -> ProcessResult<()> {
    Err(ProcessError::Signal {
        port,
        reason: "kill is not supported on this platform".to_string(),
    })
}
