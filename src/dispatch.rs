//! Routes every configured server to its [backend](crate::backends).

use std::fmt;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::backends::credentials::DEFAULT_CREDENTIALS_PATH;
use crate::backends::{Backup, BackupReport, MySql, Postgres};
use crate::config::{BackupConfig, ServerConfig};
use crate::process::CommandRunner;

/// Settings of a backup run that don't come from the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Where MySQL credentials are staged while a server is backed up.
    pub credentials_path: PathBuf,
    /// Only list databases, don't dump them.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            dry_run: false,
        }
    }
}

#[derive(Debug, Display, Error)]
/// Errors preventing a backup run.
pub enum DispatchError {
    /// The config has no `backup_dir`.
    #[display("No backup_dir configured")]
    MissingBackupDir,
}

/// What happened to a single server.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    #[display("{} database(s) dumped, {} failed", _0.dumped.len(), _0.failed.len())]
    Completed(BackupReport),
    /// The backend gave up on the server.
    #[display("backup failed: {_0}")]
    Failed(String),
    /// The server has a `type` no backend exists for.
    #[display("unknown server type '{kind}', skipped")]
    Skipped { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSummary {
    pub name: Option<String>,
    pub outcome: ServerOutcome,
}

impl fmt::Display for ServerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "'{name}': {}", self.outcome),
            None => write!(f, "unnamed server: {}", self.outcome),
        }
    }
}

/// Per-server outcomes of a run, in config order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub servers: Vec<ServerSummary>,
}

/// Resolve the directory all backups are stored below.
pub fn backup_root(config: &BackupConfig) -> Result<&Path, DispatchError> {
    let backup_root = config
        .backup_dir
        .as_deref()
        .ok_or(DispatchError::MissingBackupDir)?;
    if backup_root.is_relative() {
        log::warn!(target: "dispatch", "backup_dir is relative: {}", backup_root.display());
    }

    Ok(backup_root)
}

/// Back up every server of `config`, one after the other.
///
/// Only a missing `backup_dir` is an error. Servers that fail are logged and recorded
/// in the [RunSummary], the run continues with the next one.
pub fn run(
    config: &BackupConfig,
    runner: &dyn CommandRunner,
    options: &RunOptions,
) -> Result<RunSummary, DispatchError> {
    let backup_root = backup_root(config)?;
    if options.dry_run {
        log::warn!(target: "dispatch", "Running in dry-run mode");
    }

    let mut summary = RunSummary::default();
    for server in &config.servers {
        let outcome = backup_server(backup_root, server, runner, options);
        let server_summary = ServerSummary {
            name: server.name().map(str::to_owned),
            outcome,
        };

        match server_summary.outcome {
            ServerOutcome::Failed(_) => log::error!(target: "dispatch", "{server_summary}"),
            _ => log::info!(target: "dispatch", "{server_summary}"),
        }
        summary.servers.push(server_summary);
    }

    Ok(summary)
}

fn backup_server(
    backup_root: &Path,
    server: &ServerConfig,
    runner: &dyn CommandRunner,
    options: &RunOptions,
) -> ServerOutcome {
    match server {
        ServerConfig::MySql(mysql) => {
            MySql::with_config(backup_root, mysql.clone(), &options.credentials_path)
                .backup(runner, options.dry_run)
                .map_or_else(
                    |e| ServerOutcome::Failed(e.to_string()),
                    ServerOutcome::Completed,
                )
        }
        ServerConfig::Postgres(postgres) => match Postgres::with_config(postgres.clone())
            .backup(runner, options.dry_run)
        {
            Ok(report) => ServerOutcome::Completed(report),
            Err(never) => match never {},
        },
        ServerConfig::Unknown { kind, .. } => {
            log::info!(target: "dispatch", "I don't know what a server of type '{kind}' is");
            ServerOutcome::Skipped { kind: kind.clone() }
        }
    }
}
