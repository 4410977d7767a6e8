//! Library to dump the databases of a set of database servers.
//!
//! A [`config::BackupConfig`] lists the servers to back up. The [`dispatch`] module
//! routes each of them to its backend in [`backends`], which talk to the database
//! through external client tools run by a [`process::CommandRunner`].
//!
//! Every database ends up in `<backup_dir>/<server>/<database>/<timestamp>.sql`.

#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod process;
