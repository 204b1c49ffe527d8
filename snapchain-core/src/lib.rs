//! Snapchain core
//!
//! Incremental directory backups as a chain of timestamped snapshots. rsync
//! does the copying; unchanged files are hard-linked against the snapshot the
//! `latest` pointer names, and the pointer only moves after a successful run.

pub mod channel;
pub mod command;
pub mod executor;
pub mod paths;
pub mod planner;
pub mod sink;
pub mod target;
pub mod utils;

// Re-export commonly used types
pub use executor::{ensure_tool_available, BackupExecutor, BackupResult};
pub use planner::BackupType;
pub use sink::LogSink;
pub use target::BackupTarget;
pub use utils::errors::SnapshotError;
pub type Result<T> = std::result::Result<T, SnapshotError>;
