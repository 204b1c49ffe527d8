//! Snapshot naming and backup type selection.

use crate::target::BackupTarget;
use crate::utils::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Second-resolution, lexicographically sortable snapshot name format.
pub const SNAPSHOT_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Complete,
    Incremental,
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupType::Complete => write!(f, "complete"),
            BackupType::Incremental => write!(f, "incremental"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub path: PathBuf,
    pub backup_type: BackupType,
}

/// What the destination's current state allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Ready(SnapshotPlan),
    /// Something already sits at the candidate path.
    Collision { path: PathBuf },
    /// The destination holds entries but `latest` is not a live symlink.
    Inconsistent { destination: PathBuf, link_dir: PathBuf },
}

pub fn snapshot_name(now: &DateTime<Local>) -> String {
    now.format(SNAPSHOT_NAME_FORMAT).to_string()
}

/// Decide where the next snapshot goes and whether it can be incremental.
///
/// Only I/O failures are errors; every state of the destination maps to a
/// [`PlanOutcome`].
pub fn plan_next_snapshot(target: &BackupTarget, now: DateTime<Local>) -> Result<PlanOutcome> {
    let paths = target.paths();
    let candidate = target.destination_root().join(snapshot_name(&now));

    if paths.exists(&candidate)? || paths.is_symlink(&candidate)? {
        return Ok(PlanOutcome::Collision { path: candidate });
    }

    let previous_exists = !paths.is_empty_directory(target.destination_root())?;

    if previous_exists {
        let link_dir = target.link_dir();
        // a dangling pointer counts as missing
        if !paths.is_symlink(link_dir)? || !paths.exists(link_dir)? {
            return Ok(PlanOutcome::Inconsistent {
                destination: target.destination_root().to_path_buf(),
                link_dir: link_dir.to_path_buf(),
            });
        }
    }

    let backup_type = if previous_exists {
        BackupType::Incremental
    } else {
        BackupType::Complete
    };

    Ok(PlanOutcome::Ready(SnapshotPlan {
        path: candidate,
        backup_type,
    }))
}
