//! Backup target configuration.
//!
//! A [`BackupTarget`] binds a local source directory to a destination root on
//! some filesystem. Both directories are validated once, at construction; the
//! value is immutable afterwards.

use crate::channel::{ShellChannel, SshChannel};
use crate::paths::{LocalPaths, PathOps, RemotePaths};
use crate::utils::{Result, SnapshotError};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the pointer to the most recent successful snapshot.
pub const LATEST_LINK_NAME: &str = "latest";

pub struct BackupTarget {
    source_dir: PathBuf,
    destination_root: PathBuf,
    exclude_patterns: Vec<String>,
    link_dir: PathBuf,
    paths: Box<dyn PathOps>,
}

impl BackupTarget {
    /// Build a target whose destination is reached through `paths`.
    ///
    /// The source is always local (it is what rsync reads) and is kept as
    /// given, since a trailing slash changes what rsync copies. The destination
    /// is checked with `paths` and made absolute, so `latest` and
    /// `--link-dest` never depend on a working directory.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        exclude_patterns: Vec<String>,
        paths: Box<dyn PathOps>,
    ) -> Result<Self> {
        let source_dir = source_dir.into();
        let destination_root = destination_root.into();

        LocalPaths.ensure_is_directory(&source_dir)?;
        paths.ensure_is_directory(&destination_root)?;
        let destination_root = paths.resolve(&destination_root)?;

        let link_dir = destination_root.join(LATEST_LINK_NAME);

        Ok(Self {
            source_dir,
            destination_root,
            exclude_patterns,
            link_dir,
            paths,
        })
    }

    /// A target backing up into a directory on this machine.
    pub fn local(
        source_dir: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        exclude_patterns: Vec<String>,
    ) -> Result<Self> {
        Self::new(
            source_dir,
            destination_root,
            exclude_patterns,
            Box::new(LocalPaths::new()),
        )
    }

    /// A target backing up to a directory on the host behind `channel`.
    pub fn remote<C: ShellChannel + 'static>(
        channel: C,
        source_dir: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        exclude_patterns: Vec<String>,
    ) -> Result<Self> {
        let destination_root = destination_root.into();
        if !destination_root.is_absolute() {
            return Err(SnapshotError::InvalidPath(format!(
                "remote destination {} must be absolute",
                destination_root.display()
            )));
        }
        Self::new(
            source_dir,
            destination_root,
            exclude_patterns,
            Box::new(RemotePaths::new(channel)),
        )
    }

    /// Connect over SSH and build a remote target.
    pub fn ssh(
        user_at_host: &str,
        port: u16,
        identity_file: Option<&Path>,
        source_dir: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        exclude_patterns: Vec<String>,
    ) -> Result<Self> {
        let channel = SshChannel::connect(user_at_host, port, identity_file)?;
        Self::remote(channel, source_dir, destination_root, exclude_patterns)
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn link_dir(&self) -> &Path {
        &self.link_dir
    }

    pub fn paths(&self) -> &dyn PathOps {
        self.paths.as_ref()
    }
}

impl fmt::Debug for BackupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupTarget")
            .field("source_dir", &self.source_dir)
            .field("destination_root", &self.destination_root)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("link_dir", &self.link_dir)
            .finish_non_exhaustive()
    }
}
