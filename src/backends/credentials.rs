//! Transient MySQL option file holding the login of a single server.
//!
//! The client tools read the credentials via `--defaults-file`, so the password never
//! shows up on a command line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::mem::ManuallyDrop;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::config::MySqlServer;

/// Option file written into the current working directory by default.
pub const DEFAULT_CREDENTIALS_PATH: &str = "backup_dbs.cnf";

/// Staging the credentials failed.
#[derive(Debug, Display, Error)]
#[display("Writing the credentials file {} failed: {source}", path.display())]
pub struct CredentialError {
    path: PathBuf,
    source: io::Error,
}

/// Staged credentials of a MySQL server.
///
/// The file exists exactly as long as the guard does: it is removed when the guard
/// is dropped, on early returns and unwinding panics alike.
#[derive(Debug)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    /// Write the `[client]` section for `server` to `path`.
    ///
    /// An existing file is replaced. On Unix the file is only accessible by its owner.
    pub fn stage(path: &Path, server: &MySqlServer) -> Result<Self, CredentialError> {
        let error = |source| CredentialError {
            path: path.to_path_buf(),
            source,
        };

        // a leftover file of an aborted run might carry looser permissions
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(error(e)),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).map_err(error)?;
        // from here on the guard owns the file, even if writing fails
        let staged = Self {
            path: path.to_path_buf(),
        };

        file.write_all(client_section(server).as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(error)?;
        log::trace!(target: "backend::credentials", "Staged credentials of '{}' at {}", server.name, path.display());

        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting failures instead of only logging them.
    pub fn unstage(self) -> io::Result<()> {
        // skip the removal in drop
        let mut this = ManuallyDrop::new(self);
        let path = std::mem::take(&mut this.path);

        fs::remove_file(&path)?;
        log::trace!(target: "backend::credentials", "Removed credentials at {}", path.display());
        Ok(())
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!(
                target: "backend::credentials",
                "Removing credentials file {} failed: {e}",
                self.path.display()
            );
        }
    }
}

fn client_section(server: &MySqlServer) -> String {
    let mut section = format!(
        "[client]\nhost=\"{}\"\nuser=\"{}\"\npassword=\"{}\"\n",
        server.host, server.user, server.password
    );
    if let Some(port) = server.port {
        section.push_str(&format!("port={port}\n"));
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> MySqlServer {
        MySqlServer {
            name: "s1".into(),
            host: "h".into(),
            user: "u".into(),
            password: "p".into(),
            port: None,
            compress: false,
        }
    }

    #[test]
    fn writes_client_section_and_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CREDENTIALS_PATH);

        let staged = CredentialFile::stage(&path, &server()).unwrap();
        assert_eq!(
            fs::read_to_string(staged.path()).unwrap(),
            "[client]\nhost=\"h\"\nuser=\"u\"\npassword=\"p\"\n"
        );

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn includes_port_when_configured() {
        let server = MySqlServer {
            port: Some(3307),
            ..server()
        };
        assert!(client_section(&server).ends_with("password=\"p\"\nport=3307\n"));
    }

    #[test]
    fn unstage_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CREDENTIALS_PATH);

        CredentialFile::stage(&path, &server())
            .unwrap()
            .unstage()
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn replaces_leftover_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CREDENTIALS_PATH);
        fs::write(&path, "stale").unwrap();

        let staged = CredentialFile::stage(&path, &server()).unwrap();
        assert!(fs::read_to_string(staged.path()).unwrap().starts_with("[client]"));
    }

    #[cfg(unix)]
    #[test]
    fn only_owner_can_access() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CREDENTIALS_PATH);

        let staged = CredentialFile::stage(&path, &server()).unwrap();
        let mode = fs::metadata(staged.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(DEFAULT_CREDENTIALS_PATH);

        let err = CredentialFile::stage(&path, &server()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
