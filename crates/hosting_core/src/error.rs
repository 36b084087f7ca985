//! Error types for the hosting core

use std::{io::Error as IoError, path::PathBuf, time::Duration};
use thiserror::Error;

/// Archive validation errors
///
/// These are the only client-facing failures in the upload pipeline; they
/// always occur before any filesystem mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Uploaded file is not a readable zip archive: {0}")]
    BadArchive(#[from] zip::result::ZipError),

    #[error("Required files missing from archive: {}", .0.join(", "))]
    MissingMarkers(Vec<String>),

    #[error("Required files resolve to conflicting content roots: {}", .0.join("; "))]
    AmbiguousEntryRoot(Vec<String>),

    #[error("Archive entry #{index} has a name that is not valid {charset}")]
    EntryNameEncoding { index: usize, charset: String },

    #[error("Unsupported filename charset: {0}")]
    UnsupportedCharset(String),
}

/// Staging and swap errors
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Failed to create directory {0}: {1}")]
    DirCreate(PathBuf, IoError),

    #[error("Failed to remove directory {0}: {1}")]
    DirRemove(PathBuf, IoError),

    #[error("Failed to read directory {0}: {1}")]
    DirRead(PathBuf, IoError),

    #[error("Failed to extract archive entry {0}: {1}")]
    Extract(String, IoError),

    #[error("Archive read failed during extraction: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: IoError,
    },

    #[error("Index tool {tool} failed: {reason}")]
    IndexTool { tool: PathBuf, reason: String },

    #[error("Archive entry {0} escapes the staging directory")]
    UnsafeEntryPath(String),

    #[error("Staging task was aborted: {0}")]
    TaskJoin(String),
}

/// Subprocess lifecycle errors
///
/// Never fatal to an upload; surfaced as a warning status instead.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {binary}: {source}")]
    Spawn { binary: PathBuf, source: IoError },

    #[error("Failed to signal server on port {port}: {reason}")]
    Signal { port: u16, reason: String },

    #[error("Server on port {0} ignored both interrupt and kill for {1:?}")]
    StopTimeout(u16, Duration),
}

/// Properties file and port table errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, IoError),

    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, IoError),

    #[error("Failed to replace {0}: {1}")]
    Replace(PathBuf, IoError),

    #[error("Port table {0} is corrupt: {1}")]
    PortTable(PathBuf, serde_json::Error),

    #[error("Port range exhausted: base port {base}, {assigned} worlds assigned")]
    PortRangeExhausted { base: u16, assigned: u64 },
}

/// Umbrella error for the upload pipeline
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Unsupported engine: {0}")]
    UnsupportedEngine(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HostingError {
    /// Whether the failure should surface as a bad request rather than an
    /// internal error. Validation failures enumerate every violation so the
    /// caller can report all of them at once; everything else stays opaque.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HostingError::Validation(_) | HostingError::UnsupportedEngine(_)
        )
    }
}

// Result type aliases for convenience
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type StageResult<T> = Result<T, StageError>;
pub type ProcessResult<T> = Result<T, ProcessError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type HostingResult<T> = Result<T, HostingError>;
