use std::convert::Infallible;

use super::{Backup, BackupReport};
use crate::config::PostgresServer;
use crate::process::CommandRunner;

/// Postgres servers are accepted in the configuration but not backed up yet.
#[derive(Debug, Clone)]
pub struct Postgres {
    server: PostgresServer,
}

impl Postgres {
    pub fn with_config(server: PostgresServer) -> Self {
        Self { server }
    }
}

impl Backup for Postgres {
    type Error = Infallible;

    fn backup(
        &self,
        _runner: &dyn CommandRunner,
        _dry_run: bool,
    ) -> Result<BackupReport, Self::Error> {
        log::info!(target: "backend::postgres", "Backing up Postgres server '{}'", self.server.name);
        log::warn!(target: "backend::postgres", "Postgres backups aren't supported yet, nothing was dumped");

        Ok(BackupReport::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandOutput, ExternalCommand};

    struct Unreachable;

    impl CommandRunner for Unreachable {
        fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutput> {
            panic!("postgres backend should not run {command}");
        }
    }

    #[test]
    fn announces_without_running_anything() {
        let postgres = Postgres::with_config(PostgresServer { name: "pg".into() });
        let report = postgres.backup(&Unreachable, false).unwrap();
        assert_eq!(report, BackupReport::default());
    }
}
