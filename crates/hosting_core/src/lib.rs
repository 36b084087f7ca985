//! # Hosting Core - multi-engine game hosting
//!
//! The hosting subsystem of a game-distribution platform. Given an uploaded
//! zip archive, this crate:
//!
//! * **Identifies and validates** the content against engine-specific
//!   required marker files, deriving the entry root inside the archive
//! * **Stages and swaps** the validated tree into the live, publicly served
//!   directory for the game
//! * **Supervises** the world-server subprocess for the sandbox engine,
//!   allocating a stable port per world, rewriting its configuration files,
//!   and serializing restart-on-redeploy per port
//!
//! The HTTP layer, catalog persistence, and static file serving live
//! outside this crate; they call in through [`EngineRegistry`] and the
//! [`EngineHandler`] contract.
//!
//! ## Pipeline
//!
//! 1. The caller selects a handler via [`EngineRegistry::handler`]
//! 2. Validation enumerates the archive once and locates every required
//!    marker, reporting all missing ones together
//! 3. Staging extracts to a per-key scratch directory, prepares the
//!    complete tree there, then deletes the old live directory and renames
//!    the new one into place
//! 4. (Sandbox only) config materialization injects generated values into
//!    the world descriptor and the per-port server config, then the
//!    supervisor restarts the world's process
//!
//! ## Error model
//!
//! Validation failures are client-facing and happen before any filesystem
//! mutation. Staging failures are internal. Subprocess failures never fail
//! an upload; they surface as a warning status in [`UploadOutcome`].

pub use archive::{ArchiveEntry, EntryRoot};
pub use config::{HostingConfig, IndexToolConfig, MinetestConfig};
pub use engine::Engine;
pub use error::{
    ConfigError, HostingError, HostingResult, ProcessError, StageError, ValidationError,
};
pub use handlers::{
    DownloadableHandler, EasyRpgHandler, EngineHandler, EngineRegistry, HtmlHandler,
    MinetestHandler, ServerStatus, UploadOutcome,
};
pub use supervisor::MinetestSupervisor;

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod properties;
pub mod staging;
pub mod supervisor;
