//! Job file for the `run` command.
//!
//! ```toml
//! [log]
//! level = "info"
//! file = "/var/log/snapchain.log"
//!
//! [[job]]
//! name = "home"
//! source = "/home/"
//! destination = "/media/backup/home"
//! exclude = ["/home/*/.cache/", "**/node_modules/"]
//! ```

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use snapchain_core::channel::ssh::DEFAULT_SSH_PORT;
use snapchain_core::BackupTarget;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub rsync: RsyncConfig,

    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Run log file; see [`default_log_file`]
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsyncConfig {
    #[serde(default = "default_rsync_program")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,

    pub source: PathBuf,

    pub destination: PathBuf,

    /// rsync exclude patterns, applied in this order
    #[serde(default)]
    pub exclude: Vec<String>,

    /// `user@host` when the destination lives on another machine
    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key for SSH; the agent is used when absent
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_rsync_program() -> String {
    snapchain_core::command::RSYNC.to_string()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for RsyncConfig {
    fn default() -> Self {
        Self {
            program: default_rsync_program(),
        }
    }
}

/// `~/.local/share/backup/rsync-backups.log` on Linux.
pub fn default_log_file() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_local_dir().join("backup"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rsync-backups.log")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), directories::BaseDirs::new()) {
        (Ok(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing job file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                bail!("duplicate job name '{}'", job.name);
            }
        }
        Ok(())
    }

    /// Jobs named in `names`, in file order; every job when `names` is empty.
    pub fn select_jobs(&self, names: &[String]) -> anyhow::Result<Vec<&JobConfig>> {
        for name in names {
            if !self.jobs.iter().any(|j| &j.name == name) {
                bail!("no job named '{}'", name);
            }
        }
        Ok(self
            .jobs
            .iter()
            .filter(|j| names.is_empty() || names.contains(&j.name))
            .collect())
    }
}

impl JobConfig {
    /// Build the target, connecting over SSH for remote jobs.
    pub fn target(&self) -> snapchain_core::Result<BackupTarget> {
        match &self.remote {
            Some(user_at_host) => BackupTarget::ssh(
                user_at_host,
                self.port,
                self.identity_file.as_deref().map(expand_home).as_deref(),
                &self.source,
                &self.destination,
                self.exclude.clone(),
            ),
            None => BackupTarget::local(&self.source, &self.destination, self.exclude.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[log]
level = "debug"

[[job]]
name = "home"
source = "/home/"
destination = "/media/backup_drive/home"
exclude = ["/home/*/.cache/", "/home/*/.local/", "**/node_modules/"]

[[job]]
name = "photos"
source = "/srv/photos"
destination = "/backups/photos"
remote = "alice@nas.local"
identity_file = "~/.ssh/id_ed25519"
"#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.log.level, "debug");
        assert!(config.log.file.is_none());
        assert_eq!(config.rsync.program, "rsync");
        assert_eq!(config.jobs.len(), 2);

        let home = &config.jobs[0];
        assert_eq!(
            home.exclude,
            vec!["/home/*/.cache/", "/home/*/.local/", "**/node_modules/"]
        );
        assert!(home.remote.is_none());
        assert_eq!(home.port, 22);

        let photos = &config.jobs[1];
        assert_eq!(photos.remote.as_deref(), Some("alice@nas.local"));
        assert!(photos.exclude.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.log.level, "info");
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_select_jobs() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.select_jobs(&[]).unwrap().len(), 2);

        let only = config.select_jobs(&["photos".to_string()]).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "photos");

        assert!(config.select_jobs(&["music".to_string()]).is_err());
    }

    #[test]
    fn test_duplicate_job_names_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jobs.toml");
        std::fs::write(
            &path,
            "[[job]]\nname = \"a\"\nsource = \"/x\"\ndestination = \"/y\"\n\
             [[job]]\nname = \"a\"\nsource = \"/x\"\ndestination = \"/z\"\n",
        )
        .unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_local_job_target_validates_paths() {
        let source = tempfile::TempDir::new().unwrap();
        let dest = tempfile::TempDir::new().unwrap();
        let job = JobConfig {
            name: "tmp".to_string(),
            source: source.path().to_path_buf(),
            destination: dest.path().to_path_buf(),
            exclude: vec!["*.bak".to_string()],
            remote: None,
            port: DEFAULT_SSH_PORT,
            identity_file: None,
        };

        let target = job.target().unwrap();
        assert_eq!(
            target.link_dir(),
            std::fs::canonicalize(dest.path()).unwrap().join("latest")
        );
        assert_eq!(target.exclude_patterns(), ["*.bak".to_string()]);

        let broken = JobConfig {
            destination: PathBuf::from("/bad/directory/path/here/does/not/exist"),
            ..job
        };
        assert!(broken.target().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/etc/key")), PathBuf::from("/etc/key"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(
                expand_home(Path::new("~/.ssh/id_ed25519")),
                dirs.home_dir().join(".ssh/id_ed25519")
            );
        }
    }
}
