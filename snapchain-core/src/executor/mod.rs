//! Backup run executor - drives one snapshot from planning to pointer swap.
//!
//! A run moves through these states:
//!
//! | State        | Work                                              |
//! |--------------|---------------------------------------------------|
//! | `Start`      | transfer program must be on `PATH`                |
//! | `Planned`    | snapshot path and backup type chosen              |
//! | `Executing`  | rsync runs to completion, output goes to the log  |
//! | `Succeeded`  | `latest` is swapped to the new snapshot           |
//! | `RolledBack` | the partial snapshot is removed                   |
//!
//! Nothing in the destination is touched before `Executing`, the pointer is
//! only swapped after rsync reports success, and a rollback only ever removes
//! the snapshot this run created.

use crate::command::{TransferCommand, RSYNC};
use crate::planner::{plan_next_snapshot, BackupType, PlanOutcome, SnapshotPlan};
use crate::sink::LogSink;
use crate::target::BackupTarget;
use crate::utils::{Result, SnapshotError};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Start,
    Planned,
    Executing,
    Succeeded,
    RolledBack,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Start => "start",
            RunState::Planned => "planned",
            RunState::Executing => "executing",
            RunState::Succeeded => "succeeded",
            RunState::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub snapshot: PathBuf,
    pub backup_type: BackupType,
    pub duration_secs: f64,
}

/// Fail unless `program` resolves to an executable.
pub fn ensure_tool_available(program: &str) -> Result<PathBuf> {
    which::which(program)
        .map_err(|e| SnapshotError::ToolMissing(format!("{} is not installed: {}", program, e)))
}

/// Runs backups against targets, logging to the sink it was built with.
pub struct BackupExecutor {
    sink: LogSink,
    program: String,
    clock: Box<dyn Fn() -> DateTime<Local>>,
}

impl BackupExecutor {
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            program: RSYNC.to_string(),
            clock: Box::new(Local::now),
        }
    }

    /// Use another transfer program with rsync's command-line contract.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Source of the timestamp snapshot names are derived from.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Execute one backup run against `target`.
    ///
    /// Returns the new snapshot on success. On failure the destination is left
    /// as it was before the run.
    pub fn execute(&self, target: &BackupTarget) -> Result<BackupResult> {
        let started = Instant::now();
        self.transition(RunState::Start, target);
        self.sink.info(format!(
            "Starting backup of {} to {}",
            target.source_dir().display(),
            target.destination_root().display()
        ));

        if let Err(e) = ensure_tool_available(&self.program) {
            self.sink.error(e.to_string());
            return Err(e);
        }

        let plan = self.plan(target)?;
        self.transition(RunState::Planned, target);

        match plan.backup_type {
            BackupType::Incremental => {
                let previous = target.paths().resolve(target.link_dir())?;
                self.sink.info(format!(
                    "Starting incremental backup from {}",
                    previous.display()
                ));
            }
            BackupType::Complete => {
                self.sink.info(format!(
                    "No previous backup found at {}",
                    target.destination_root().display()
                ));
                self.sink.info(format!(
                    "Starting a fresh complete backup from {} to {}",
                    target.source_dir().display(),
                    target.destination_root().display()
                ));
            }
        }

        let command =
            TransferCommand::build_with_program(&self.program, target, &plan.path, plan.backup_type);
        self.transition(RunState::Executing, target);
        let exit_status = self.run_transfer(&command)?;

        if exit_status == 0 {
            self.sink.info("Finished backup successfully");
            self.swap_latest(target, &plan.path)?;
            self.transition(RunState::Succeeded, target);

            let duration_secs = started.elapsed().as_secs_f64();
            self.sink.info(format!(
                "Backup {} complete: {} ({} backup, {:.3} seconds)",
                target.destination_root().display(),
                plan.path.display(),
                plan.backup_type,
                duration_secs
            ));
            Ok(BackupResult {
                snapshot: plan.path,
                backup_type: plan.backup_type,
                duration_secs,
            })
        } else {
            self.sink.error(format!(
                "Backup failed. Transfer exit code: {}",
                exit_status
            ));
            self.roll_back(target, &plan.path);
            self.transition(RunState::RolledBack, target);

            Err(SnapshotError::BackupFailed {
                exit_status,
                destination: target.destination_root().display().to_string(),
                snapshot: plan.path.display().to_string(),
                link_dir: target.link_dir().display().to_string(),
            })
        }
    }

    fn transition(&self, state: RunState, target: &BackupTarget) {
        debug!(state = %state, destination = %target.destination_root().display(), "backup run");
    }

    fn plan(&self, target: &BackupTarget) -> Result<SnapshotPlan> {
        match plan_next_snapshot(target, (self.clock)())? {
            PlanOutcome::Ready(plan) => Ok(plan),
            PlanOutcome::Collision { path } => {
                let err = SnapshotError::InvalidPath(format!(
                    "{} already exists and would be overwritten",
                    path.display()
                ));
                self.sink.error(err.to_string());
                Err(err)
            }
            PlanOutcome::Inconsistent {
                destination,
                link_dir,
            } => {
                let err = SnapshotError::InconsistentDestination {
                    destination: destination.display().to_string(),
                    link_dir: link_dir.display().to_string(),
                };
                self.sink.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Run the transfer to completion and return its exit status.
    ///
    /// stdout and stderr share one pipe, so lines reach the log in the order
    /// rsync wrote them.
    fn run_transfer(&self, command: &TransferCommand) -> Result<i32> {
        self.sink.info(format!("Running {}", command));

        let started = Instant::now();
        let (reader, writer) = io::pipe()?;
        let mut process = command.to_command();
        process
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        let mut child = process.spawn().map_err(|e| {
            self.sink.error(format!("Failed to start {}: {}", command.program, e));
            SnapshotError::Io(e)
        })?;
        // the pipe only reaches EOF once every write end is closed
        drop(process);

        for line in BufReader::new(reader).split(b'\n') {
            let line = line?;
            self.sink
                .info(format!("RSYNC: {}", String::from_utf8_lossy(&line).trim_end()));
        }
        let status = child.wait()?;
        self.sink.info(format!(
            "Time elapsed {:.3} seconds",
            started.elapsed().as_secs_f64()
        ));

        // killed by a signal
        Ok(status.code().unwrap_or(-1))
    }

    fn swap_latest(&self, target: &BackupTarget, snapshot: &Path) -> Result<()> {
        let paths = target.paths();
        let link_dir = target.link_dir();

        if paths.exists(link_dir)? || paths.is_symlink(link_dir)? {
            paths.unlink(link_dir)?;
        }
        paths.symlink_to(link_dir, snapshot)?;

        self.sink.info(format!(
            "Symlink created from {} to {}",
            snapshot.display(),
            link_dir.display()
        ));
        Ok(())
    }

    /// Remove the partial snapshot. Failures are logged; the run's own
    /// `BackupFailed` is what the caller gets.
    fn roll_back(&self, target: &BackupTarget, snapshot: &Path) {
        let paths = target.paths();
        let result = paths.exists(snapshot).and_then(|exists| {
            if exists {
                self.sink
                    .info(format!("Deleting failed backup at {}", snapshot.display()));
                paths.remove_tree(snapshot)?;
            }
            Ok(())
        });

        if let Err(e) = result {
            self.sink.error(format!(
                "Could not remove partial snapshot {}: {}",
                snapshot.display(),
                e
            ));
        }
    }
}
