//! Loading of the TOML configuration listing the servers to back up.
//!
//! ```toml
//! backup_dir = "/srv/backup"
//!
//! [[servers]]
//! type = "mysql"
//! name = "primary"
//! host = "db.example.org"
//! user = "backup"
//! password = "secret"
//! ```

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};
use serde::Deserialize;

/// Config file looked up in the current working directory by default.
pub const DEFAULT_CONFIG_PATH: &str = "backup_dbs.toml";

/// Contents of the configuration file.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct BackupConfig {
    /// Root directory below which every server gets its own directory.
    ///
    /// Optional at load time, but a backup run can't start without it.
    pub backup_dir: Option<PathBuf>,

    /// Servers in the order they are backed up.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

/// A single `[[servers]]` entry, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawServer")]
pub enum ServerConfig {
    MySql(MySqlServer),
    Postgres(PostgresServer),
    /// Entry with a `type` that isn't supported. A missing `type` is the empty string.
    Unknown {
        kind: String,
        name: Option<String>,
    },
}

impl ServerConfig {
    /// Label of the server, if the entry has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            ServerConfig::MySql(server) => Some(&server.name),
            ServerConfig::Postgres(server) => Some(&server.name),
            ServerConfig::Unknown { name, .. } => name.as_deref(),
        }
    }
}

/// Connection settings of a MySQL server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MySqlServer {
    /// Directory name below the backup root.
    pub name: String,
    pub host: String,
    pub user: String,
    pub password: String,
    /// Port of the server, the client default if unset.
    #[serde(default)]
    pub port: Option<u16>,
    /// Store dumps gzip compressed as `<timestamp>.sql.gz`.
    #[serde(default)]
    pub compress: bool,
}

/// Postgres server. Only announced, never backed up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostgresServer {
    pub name: String,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(flatten)]
    fields: toml::Table,
}

/// A server entry of a known type is missing fields or has fields of the wrong type.
#[derive(Debug, Display, Error)]
#[display("invalid {kind} server entry: {source}")]
pub struct InvalidServer {
    kind: String,
    source: toml::de::Error,
}

impl TryFrom<RawServer> for ServerConfig {
    type Error = InvalidServer;

    fn try_from(raw: RawServer) -> Result<Self, Self::Error> {
        let RawServer { kind, fields } = raw;

        match kind.as_str() {
            "mysql" => toml::Value::Table(fields)
                .try_into()
                .map(ServerConfig::MySql)
                .map_err(|source| InvalidServer { kind, source }),
            "postgres" => toml::Value::Table(fields)
                .try_into()
                .map(ServerConfig::Postgres)
                .map_err(|source| InvalidServer { kind, source }),
            _ => {
                let name = fields
                    .get("name")
                    .and_then(toml::Value::as_str)
                    .map(str::to_owned);
                Ok(ServerConfig::Unknown { kind, name })
            }
        }
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on loading the [BackupConfig].
pub enum ConfigError {
    /// The config file exists but can't be read.
    #[display("Reading the config file {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    /// The config file isn't valid.
    #[display("Parsing the config file failed: {_0}")]
    #[from]
    Parse(toml::de::Error),
}

/// Load the configuration from `path`.
///
/// A missing file isn't an error and results in an empty [BackupConfig].
pub fn load_config(path: &Path) -> Result<BackupConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!(target: "config", "No config file at {}, using an empty config", path.display());
            return Ok(BackupConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config: BackupConfig = toml::from_str(&content)?;
    log::debug!(target: "config", "Loaded {} server(s) from {}", config.servers.len(), path.display());

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join(DEFAULT_CONFIG_PATH)).unwrap();

        assert_eq!(config, BackupConfig::default());
        assert!(config.backup_dir.is_none());
        assert!(config.servers.is_empty());
    }

    #[test]
    fn parses_servers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup_dbs.toml");
        std::fs::write(
            &path,
            r#"
            backup_dir = "/tmp/b"

            [[servers]]
            type = "mysql"
            name = "s1"
            host = "h"
            user = "u"
            password = "p"

            [[servers]]
            type = "postgres"
            name = "pg"
            host = "ignored"

            [[servers]]
            type = "oracle"
            name = "legacy"

            [[servers]]
            name = "untyped"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.backup_dir, Some(PathBuf::from("/tmp/b")));
        assert_eq!(
            config.servers,
            vec![
                ServerConfig::MySql(MySqlServer {
                    name: "s1".into(),
                    host: "h".into(),
                    user: "u".into(),
                    password: "p".into(),
                    port: None,
                    compress: false,
                }),
                ServerConfig::Postgres(PostgresServer { name: "pg".into() }),
                ServerConfig::Unknown {
                    kind: "oracle".into(),
                    name: Some("legacy".into()),
                },
                ServerConfig::Unknown {
                    kind: String::new(),
                    name: Some("untyped".into()),
                },
            ]
        );
    }

    #[test]
    fn optional_mysql_settings() {
        let config: BackupConfig = toml::from_str(
            r#"
            [[servers]]
            type = "mysql"
            name = "s1"
            host = "h"
            user = "u"
            password = "p"
            port = 3307
            compress = true
            "#,
        )
        .unwrap();

        let ServerConfig::MySql(server) = &config.servers[0] else {
            panic!("expected a mysql server, got {:?}", config.servers[0]);
        };
        assert_eq!(server.port, Some(3307));
        assert!(server.compress);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup_dbs.toml");
        std::fs::write(&path, "backup_dir = \n[[servers]").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn incomplete_mysql_entry_is_a_parse_error() {
        let res = toml::from_str::<BackupConfig>(
            r#"
            [[servers]]
            type = "mysql"
            name = "s1"
            host = "h"
            "#,
        );

        let err = res.unwrap_err().to_string();
        assert!(err.contains("invalid mysql server entry"), "{err}");
    }
}
