use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::backends::credentials::DEFAULT_CREDENTIALS_PATH;
use crate::config::DEFAULT_CONFIG_PATH;
use crate::dispatch::RunOptions;

/// Dump every database of the configured MySQL servers into timestamped files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long, env = "DB_BACKUP_VERBOSE")]
    pub verbose: Option<LevelFilter>,

    /// Config file listing the servers to back up.
    #[arg(long, short = 'c', env = "DB_BACKUP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// File the MySQL credentials are staged in while a server is backed up.
    #[arg(long, env = "DB_BACKUP_CREDENTIALS_FILE", default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials_file: PathBuf,

    /// Only list the databases that would be dumped.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            credentials_path: self.credentials_file.clone(),
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_working_directory_layout() {
        let cli = Cli::try_parse_from(["db_backup"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("backup_dbs.toml"));
        assert_eq!(cli.credentials_file, PathBuf::from("backup_dbs.cnf"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "db_backup",
            "--config",
            "/etc/db_backup.toml",
            "--credentials-file",
            "/run/db_backup.cnf",
            "--verbose",
            "debug",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, Some(LevelFilter::Debug));
        let options = cli.run_options();
        assert_eq!(options.credentials_path, PathBuf::from("/run/db_backup.cnf"));
        assert!(options.dry_run);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
