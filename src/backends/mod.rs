//! Backend modules for backing up individual database servers.
//!
//! Currently the following backends are implemented:
//!
//! - [MySql]: Dump of every user database of a MySQL server using `mysqldump`.
//! - [Postgres]: Placeholder that only announces the server.

pub mod credentials;
pub mod mysql;
pub mod postgres;

use std::path::PathBuf;

pub use credentials::CredentialFile;
pub use mysql::MySql;
pub use postgres::Postgres;

use crate::process::CommandRunner;

/// Generic backup backend.
pub trait Backup {
    /// Error that aborts the backup of the whole server.
    type Error;

    /// Backups all databases managed by the implementation.
    ///
    /// Failures affecting a single database don't abort the backup, they are
    /// collected in the returned [BackupReport].
    ///
    /// # Dry Run
    ///
    /// On a dry run (`dry_run=true`) nothing below the backup root is altered.
    fn backup(&self, runner: &dyn CommandRunner, dry_run: bool)
        -> Result<BackupReport, Self::Error>;
}

/// Outcome of a server backup.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Files written, one per successfully dumped database.
    pub dumped: Vec<PathBuf>,
    /// Databases whose dump failed.
    pub failed: Vec<String>,
    /// Databases only listed because of a dry run.
    pub skipped: Vec<String>,
}
