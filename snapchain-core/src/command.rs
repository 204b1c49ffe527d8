//! rsync invocation builder.

use crate::planner::BackupType;
use crate::target::BackupTarget;
use std::fmt;
use std::path::Path;
use std::process::Command;

pub const RSYNC: &str = "rsync";

/// Options present on every run, in this order.
pub const BASE_ARGUMENTS: [&str; 3] = [
    "--delete",  // delete extraneous files from dest dirs
    "--archive", // -rlptgoD
    "--verbose",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TransferCommand {
    /// `rsync --delete --archive --verbose [--link-dest=..] [--exclude=..]* SRC DEST`
    pub fn build(target: &BackupTarget, snapshot: &Path, backup_type: BackupType) -> Self {
        Self::build_with_program(RSYNC, target, snapshot, backup_type)
    }

    pub fn build_with_program(
        program: &str,
        target: &BackupTarget,
        snapshot: &Path,
        backup_type: BackupType,
    ) -> Self {
        let mut args: Vec<String> = BASE_ARGUMENTS.iter().map(|a| a.to_string()).collect();

        if backup_type == BackupType::Incremental {
            args.push(format!("--link-dest={}", target.link_dir().display()));
        }

        // order matters to rsync's filter rules
        for pattern in target.exclude_patterns() {
            args.push(format!("--exclude={}", pattern));
        }

        args.push(target.source_dir().display().to_string());
        args.push(target.paths().transfer_address(snapshot));

        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
