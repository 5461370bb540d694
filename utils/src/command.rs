//! Helpers intended for [`std::process::Command`].

use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus};

use crate::CommandDisplay;

/// How much of the tail of a failed child's stderr we carry in the error.
const STDERR_TAIL_LINES: usize = 20;

/// Failure to run a child process to successful completion.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The child could not be started, e.g. the program does not exist.
    #[error("failed to execute {cmd}: {source}")]
    Spawn {
        /// The command line.
        cmd: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The child ran, but exited unsuccessfully.
    #[error("{cmd} {}{}", describe_status(.status), describe_stderr(.stderr))]
    Exited {
        /// The command line.
        cmd: String,
        /// Exit status of the child.
        status: ExitStatus,
        /// The last lines the child wrote to stderr.
        stderr: String,
    },
    /// Capturing the child's stderr failed.
    #[error("capturing stderr of {cmd}: {source}")]
    Capture {
        /// The command line.
        cmd: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// The exit code of the child, if it ran and exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exited { status, .. } => status.code(),
            _ => None,
        }
    }
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => format!("was terminated ({status})"),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Return at most the last `n` lines of `s`, joined with `; `.
fn tail_lines(s: &str, n: usize) -> String {
    let lines = s
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].join("; ")
}

/// Extension trait for [`Command`].
pub trait CommandRunExt {
    /// Synchronously execute the child, and return an error if the child exited unsuccessfully.
    ///
    /// Standard output is inherited. Standard error is captured; on failure the
    /// last lines are carried in the returned error, on success they are logged
    /// at debug level.
    fn run(&mut self) -> Result<(), CommandError>;
}

impl CommandRunExt for Command {
    fn run(&mut self) -> Result<(), CommandError> {
        let cmd = CommandDisplay::new(self).to_string();
        tracing::debug!("exec: {cmd}");
        let capture_err = |source| CommandError::Capture {
            cmd: cmd.clone(),
            source,
        };
        let mut stderr = tempfile::tempfile().map_err(capture_err)?;
        self.stderr(stderr.try_clone().map_err(capture_err)?);
        let status = self.status().map_err(|source| CommandError::Spawn {
            cmd: cmd.clone(),
            source,
        })?;
        let mut buf = Vec::new();
        stderr
            .seek(SeekFrom::Start(0))
            .and_then(|_| stderr.read_to_end(&mut buf))
            .map_err(capture_err)?;
        let captured = String::from_utf8_lossy(&buf);
        if status.success() {
            let captured = captured.trim_end();
            if !captured.is_empty() {
                tracing::debug!("{cmd}: {captured}");
            }
            Ok(())
        } else {
            Err(CommandError::Exited {
                stderr: tail_lines(&captured, STDERR_TAIL_LINES),
                cmd,
                status,
            })
        }
    }
}
