//! Filesystem operations against a backup destination.
//!
//! The executor never touches a destination directly; it goes through a
//! [`PathOps`] implementation chosen when the [`BackupTarget`] is built, so the
//! same run logic works for a local disk and for a remote host.
//!
//! [`BackupTarget`]: crate::target::BackupTarget

pub mod local;
pub mod remote;

pub use local::LocalPaths;
pub use remote::RemotePaths;

use crate::utils::Result;
use std::path::{Path, PathBuf};

/// Capability set over one filesystem.
///
/// Checks on a missing path answer `false` the way `test(1)` does. Mutations
/// and `resolve` on a missing path are errors.
pub trait PathOps {
    fn exists(&self, path: &Path) -> Result<bool>;

    fn is_symlink(&self, path: &Path) -> Result<bool>;

    fn is_directory(&self, path: &Path) -> Result<bool>;

    /// Fails with `InvalidPath` when `path` is not a directory.
    fn is_empty_directory(&self, path: &Path) -> Result<bool>;

    /// Remove a file or symbolic link.
    fn unlink(&self, path: &Path) -> Result<()>;

    /// Recursively delete a directory tree.
    fn remove_tree(&self, path: &Path) -> Result<()>;

    /// Make `link` a symbolic link to `target`.
    fn symlink_to(&self, link: &Path, target: &Path) -> Result<()>;

    /// Make the path absolute, resolving any symlinks.
    fn resolve(&self, path: &Path) -> Result<PathBuf>;

    /// Fails with `InvalidPath` if `path` does not exist or is not a directory.
    fn ensure_is_directory(&self, path: &Path) -> Result<()>;

    /// How the transfer tool addresses `path` on this filesystem.
    fn transfer_address(&self, path: &Path) -> String;
}
