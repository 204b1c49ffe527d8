//! Utility modules for the snapshot engine.

pub mod errors;

pub use errors::{Result, SnapshotError};
