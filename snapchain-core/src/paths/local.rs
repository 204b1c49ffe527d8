//! [`PathOps`] against the local filesystem.

use super::PathOps;
use crate::utils::{Result, SnapshotError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPaths;

impl LocalPaths {
    pub fn new() -> Self {
        Self
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> SnapshotError {
    if e.kind() == ErrorKind::NotFound {
        SnapshotError::FileNotFound(path.display().to_string())
    } else {
        SnapshotError::Io(e)
    }
}

impl PathOps for LocalPaths {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    fn is_symlink(&self, path: &Path) -> Result<bool> {
        Ok(path.is_symlink())
    }

    fn is_directory(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn is_empty_directory(&self, path: &Path) -> Result<bool> {
        if !path.is_dir() {
            return Err(SnapshotError::InvalidPath(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        Ok(fs::read_dir(path)?.next().is_none())
    }

    fn unlink(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| not_found_or_io(path, e))
    }

    fn remove_tree(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(|e| not_found_or_io(path, e))
    }

    fn symlink_to(&self, link: &Path, target: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link).map_err(|e| {
            SnapshotError::InvalidPath(format!(
                "cannot link {} -> {}: {}",
                link.display(),
                target.display(),
                e
            ))
        })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(|e| not_found_or_io(path, e))
    }

    fn ensure_is_directory(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(SnapshotError::InvalidPath(format!(
                "{} does not exist",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(SnapshotError::InvalidPath(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        Ok(())
    }

    fn transfer_address(&self, path: &Path) -> String {
        path.display().to_string()
    }
}
