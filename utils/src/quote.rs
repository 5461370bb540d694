use std::ffi::OsStr;
use std::fmt::Display;
use std::process::Command;

/// Helper to format a single argument the way a POSIX shell would parse it.
#[derive(Debug)]
pub struct ShellQuotedDisplay<'a> {
    arg: &'a OsStr,
}

impl<'a> Display for ShellQuotedDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.arg.to_string_lossy();
        if !s.is_empty()
            && s.chars()
                .all(|c| matches!(c, '/' | '.' | '-' | '_' | '=' | ',') || c.is_alphanumeric())
        {
            return f.write_str(&s);
        }
        match shlex::try_quote(&s) {
            Ok(r) => f.write_str(&r),
            // Only happens for embedded NUL, which can't be in an argv anyway
            Err(_) => write!(f, "{s:?}"),
        }
    }
}

impl<'a> ShellQuotedDisplay<'a> {
    /// Given an argument, quote it in a way that it would be parsed by a default
    /// POSIX shell. If the argument is UTF-8 with no spaces or shell meta-characters,
    /// it will be exactly the same as the input.
    pub fn new<S: AsRef<OsStr> + ?Sized>(arg: &'a S) -> ShellQuotedDisplay<'a> {
        ShellQuotedDisplay { arg: arg.as_ref() }
    }
}

/// Format a [`Command`] as a copy-pasteable shell command line.
#[derive(Debug)]
pub struct CommandDisplay<'a> {
    cmd: &'a Command,
}

impl<'a> CommandDisplay<'a> {
    /// Wrap the given command.
    pub fn new(cmd: &'a Command) -> Self {
        Self { cmd }
    }
}

impl<'a> Display for CommandDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", ShellQuotedDisplay::new(self.cmd.get_program()))?;
        for arg in self.cmd.get_args() {
            write!(f, " {}", ShellQuotedDisplay::new(arg))?;
        }
        Ok(())
    }
}
