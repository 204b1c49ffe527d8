//! Snapchain - command-line entry point
//!
//! Runs rsync snapshot backups, either one ad-hoc target or the jobs listed in
//! a TOML job file.

mod config;
mod utils;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::{default_log_file, expand_home, Config};
use snapchain_core::channel::ssh::DEFAULT_SSH_PORT;
use snapchain_core::{ensure_tool_available, BackupExecutor, BackupResult, BackupTarget, LogSink};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Run log file (appended to)
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Transfer program to invoke instead of rsync
    #[arg(long, global = true, value_name = "PROGRAM")]
    rsync: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the jobs from a job file, in order
    Run {
        /// Path to the job file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Only run the named job (repeatable)
        #[arg(long = "job", value_name = "NAME")]
        jobs: Vec<String>,
    },

    /// Back up one directory
    Backup {
        source: PathBuf,

        destination: PathBuf,

        /// rsync exclude pattern (repeatable, order is kept)
        #[arg(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Back up to USER@HOST over SSH
        #[arg(long, value_name = "USER@HOST")]
        remote: Option<String>,

        #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
        port: u16,

        /// SSH private key (the agent is used otherwise)
        #[arg(long, value_name = "FILE")]
        identity_file: Option<PathBuf>,
    },

    /// Check that the transfer program is installed
    Check,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.command {
        Commands::Run { config, .. } => Config::from_file(config)?,
        _ => Config::default(),
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let program = args.rsync.clone().unwrap_or_else(|| config.rsync.program.clone());

    // fatal before any run starts
    let resolved = ensure_tool_available(&program)?;
    tracing::debug!(program = %resolved.display(), "transfer program found");

    if let Commands::Check = args.command {
        println!("{}", resolved.display());
        return Ok(());
    }

    let log_file = args
        .log_file
        .clone()
        .or_else(|| config.log.file.clone())
        .unwrap_or_else(default_log_file);
    let sink = LogSink::open(&log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;
    tracing::info!(
        "snapchain v{} (log file: {})",
        env!("CARGO_PKG_VERSION"),
        log_file.display()
    );

    let executor = BackupExecutor::new(sink).with_program(program);

    match &args.command {
        Commands::Run { jobs, .. } => run_jobs(&executor, &config, jobs, args.json),
        Commands::Backup {
            source,
            destination,
            exclude,
            remote,
            port,
            identity_file,
        } => {
            let target = match remote {
                Some(user_at_host) => BackupTarget::ssh(
                    user_at_host,
                    *port,
                    identity_file.as_deref().map(expand_home).as_deref(),
                    source,
                    destination,
                    exclude.clone(),
                )?,
                None => BackupTarget::local(source, destination, exclude.clone())?,
            };
            let result = executor.execute(&target)?;
            report(&result, args.json)
        }
        Commands::Check => Ok(()),
    }
}

/// Jobs run one after another; a failed job does not stop the rest.
fn run_jobs(executor: &BackupExecutor, config: &Config, names: &[String], json: bool) -> Result<()> {
    let jobs = config.select_jobs(names)?;
    if jobs.is_empty() {
        tracing::warn!("job file lists no jobs");
        return Ok(());
    }

    let mut failed = Vec::new();
    for job in jobs {
        tracing::info!(job = %job.name, "Starting job");
        let outcome = job
            .target()
            .and_then(|target| executor.execute(&target));
        match outcome {
            Ok(result) => report(&result, json)?,
            Err(e) => {
                tracing::error!(job = %job.name, "Job failed: {}", e);
                failed.push(job.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} job(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn report(result: &BackupResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!(
            "{} ({}, {:.1}s)",
            result.snapshot.display(),
            result.backup_type,
            result.duration_secs
        );
    }
    Ok(())
}
