//! Implements backup of MySQL servers using [MySql].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use derive_more::{Display, Error, From};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::credentials::{CredentialError, CredentialFile};
use super::{Backup, BackupReport};
use crate::config::MySqlServer;
use crate::process::{CommandRunner, ExternalCommand};

const MYSQL: &str = "mysql";
const MYSQLDUMP: &str = "mysqldump";

/// Lines of `SHOW DATABASES` output that aren't user databases.
const NOT_DATABASES: [&str; 3] = ["Database", "information_schema", "performance_schema"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Display, Error, From)]
/// Errors on backup of a MySQL server.
pub enum MySqlBackupError {
    /// The credentials for the client tools can't be staged.
    #[display("Staging the MySQL credentials failed: {_0}")]
    #[from]
    Credentials(CredentialError),
    /// A client tool couldn't be started at all.
    #[display("Running {program} failed: {source}")]
    ToolNotRun { program: String, source: io::Error },
    /// The dump of a database can't be stored.
    #[display("Storing the dump of database '{database}' failed: {source}")]
    Io { database: String, source: io::Error },
}

/// The [MySql] backend dumps every user database of a MySQL server.
///
/// Dumps are stored as `<backup_root>/<server name>/<database>/<timestamp>.sql`.
#[derive(Debug, Clone)]
pub struct MySql {
    server: MySqlServer,
    server_root: PathBuf,
    credentials_path: PathBuf,
}

impl MySql {
    /// Create a new [MySql] instance.
    ///
    /// The credentials of `server` are staged at `credentials_path` while the
    /// backup runs.
    pub fn with_config(backup_root: &Path, server: MySqlServer, credentials_path: &Path) -> Self {
        let server_root = backup_root.join(&server.name);

        Self {
            server,
            server_root,
            credentials_path: credentials_path.to_path_buf(),
        }
    }

    /// Directory holding the dumps of all databases of the server.
    pub fn server_root(&self) -> &Path {
        &self.server_root
    }
}

impl Backup for MySql {
    type Error = MySqlBackupError;

    fn backup(
        &self,
        runner: &dyn CommandRunner,
        dry_run: bool,
    ) -> Result<BackupReport, Self::Error> {
        log::info!(target: "backend::mysql", "Backing up MySQL server '{}'", self.server.name);

        let credentials = CredentialFile::stage(&self.credentials_path, &self.server)?;
        let databases = list_databases(runner, credentials.path())?;
        log::debug!(target: "backend::mysql", "Found {} database(s) on '{}'", databases.len(), self.server.name);

        let mut report = BackupReport::default();
        for database in databases {
            if dry_run {
                log::info!(target: "backend::mysql", "Dry-run: skipping dump of database '{database}'");
                report.skipped.push(database);
                continue;
            }

            match dump_database(
                runner,
                credentials.path(),
                &database,
                &self.server_root,
                self.server.compress,
            ) {
                Ok(Some(dump_file)) => report.dumped.push(dump_file),
                Ok(None) => report.failed.push(database),
                Err(e) => {
                    log::error!(target: "backend::mysql", "{e}");
                    report.failed.push(database);
                }
            }
        }

        if let Err(e) = credentials.unstage() {
            log::warn!(target: "backend::mysql", "Removing the credentials of '{}' failed: {e}", self.server.name);
        }

        Ok(report)
    }
}

fn defaults_file_arg(defaults_file: &Path) -> String {
    format!("--defaults-file={}", defaults_file.display())
}

/// List the user databases of the server the credentials in `defaults_file` point to.
///
/// If `mysql` exits unsuccessfully its error output is logged and no databases are
/// returned.
pub fn list_databases(
    runner: &dyn CommandRunner,
    defaults_file: &Path,
) -> Result<Vec<String>, MySqlBackupError> {
    let command = ExternalCommand::new(MYSQL)
        .arg(defaults_file_arg(defaults_file))
        .arg("-e")
        .arg("SHOW DATABASES;");

    let output = runner
        .run(&command)
        .map_err(|source| MySqlBackupError::ToolNotRun {
            program: MYSQL.to_string(),
            source,
        })?;

    if !output.is_success() {
        log::warn!(target: "backend::mysql", "Listing databases failed: {}", output.stderr.trim_end());
        return Ok(Vec::new());
    }

    Ok(output
        .stdout_lossy()
        .lines()
        .filter(|line| !NOT_DATABASES.contains(line))
        .map(str::to_owned)
        .collect())
}

/// Dump `database` into a new timestamped file below `server_root/database`.
///
/// Returns the path of the written file, or [None] if `mysqldump` failed. In that
/// case its error output is logged and no file is written. Databases whose name
/// isn't a single path component are refused the same way.
pub fn dump_database(
    runner: &dyn CommandRunner,
    defaults_file: &Path,
    database: &str,
    server_root: &Path,
    compress: bool,
) -> Result<Option<PathBuf>, MySqlBackupError> {
    let io_error = |source| MySqlBackupError::Io {
        database: database.to_string(),
        source,
    };

    if !is_single_component(database) {
        log::warn!(
            target: "backend::mysql",
            "Refusing to dump database '{database}': name would leave {}",
            server_root.display()
        );
        return Ok(None);
    }

    let dump_dest = server_root.join(database);
    fs::create_dir_all(&dump_dest).map_err(io_error)?;
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();

    log::info!(target: "backend::mysql", "Dumping database '{database}'");
    let command = ExternalCommand::new(MYSQLDUMP)
        .arg(defaults_file_arg(defaults_file))
        .arg("--force") // continue on SQL errors
        .arg("--opt") // sensible dump defaults
        .arg("--databases")
        .arg(database)
        .arg("--events")
        .arg("--routines")
        .arg("--triggers");

    let output = runner
        .run(&command)
        .map_err(|source| MySqlBackupError::ToolNotRun {
            program: MYSQLDUMP.to_string(),
            source,
        })?;

    if !output.is_success() {
        log::warn!(target: "backend::mysql", "Dumping database '{database}' failed: {}", output.stderr.trim_end());
        return Ok(None);
    }

    let (dump_file, file) = create_dump_file(&dump_dest, &timestamp, compress).map_err(io_error)?;
    log::debug!(target: "backend::mysql", "Save dump of '{database}' at: {}", dump_file.display());

    if let Err(e) = write_dump(file, &output.stdout, compress) {
        // don't leave a truncated dump behind
        let _ = fs::remove_file(&dump_file);
        return Err(io_error(e));
    }

    Ok(Some(dump_file))
}

/// The database directory has to stay directly below the server directory.
fn is_single_component(database: &str) -> bool {
    let mut components = Path::new(database).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn dump_file_name(timestamp: &str, attempt: u32, compress: bool) -> String {
    let extension = if compress { "sql.gz" } else { "sql" };
    if attempt == 0 {
        format!("{timestamp}.{extension}")
    } else {
        format!("{timestamp}-{attempt}.{extension}")
    }
}

/// Create a new dump file, appending a counter if a dump of the same second exists.
fn create_dump_file(
    dump_dest: &Path,
    timestamp: &str,
    compress: bool,
) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0;
    loop {
        let path = dump_dest.join(dump_file_name(timestamp, attempt, compress));
        match File::create_new(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::trace!(target: "backend::mysql", "{} already exists", path.display());
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn write_dump(mut file: File, dump: &[u8], compress: bool) -> io::Result<()> {
    if compress {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(dump)?;
        encoder.finish()?.sync_all()
    } else {
        file.write_all(dump)?;
        file.sync_all()
    }
}
