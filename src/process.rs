//! Invocation of external client tools.
//!
//! Backends never spawn processes themselves. They describe the invocation as an
//! [`ExternalCommand`] and hand it to a [`CommandRunner`], so tests can answer with
//! canned output instead of running real database tools.

use std::fmt;
use std::io;
use std::process::Command;

/// A program together with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Create a command running `program` without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished [`ExternalCommand`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, [None] if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Standard error decoded as text.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a process exiting with status 0.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a process exiting with a non-zero `code`.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard output decoded as text, invalid UTF-8 is replaced.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs an [`ExternalCommand`] to completion and captures its output.
///
/// An `Err` means the program could not be run at all. A program that ran and
/// failed is reported through [`CommandOutput::code`].
pub trait CommandRunner {
    fn run(&self, command: &ExternalCommand) -> io::Result<CommandOutput>;
}

/// [CommandRunner] spawning real processes. Blocks until the process exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> io::Result<CommandOutput> {
        log::trace!(target: "process", "Running: {command}");

        let output = Command::new(command.program())
            .args(command.args())
            .output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
