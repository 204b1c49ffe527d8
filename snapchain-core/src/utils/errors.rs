//! Error types for the snapshot engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error(
        "Inconsistent destination: {destination} is not empty, indicating that a previous \
         backup exists, but {link_dir} is not a symlink to it. Refusing to run a complete \
         backup where an incremental one is expected. Empty {destination} or create the \
         symlink at {link_dir} manually."
    )]
    InconsistentDestination { destination: String, link_dir: String },

    #[error(
        "Backup failed: transfer exited with status {exit_status} \
         (destination: {destination}, snapshot: {snapshot}, latest pointer: {link_dir})"
    )]
    BackupFailed {
        exit_status: i32,
        destination: String,
        snapshot: String,
        link_dir: String,
    },

    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
