//! The build command and its result.

use std::{ffi::OsString, fmt};

use itertools::Itertools;

/// The external command that performs the actual build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    /// The program to execute, looked up in `PATH` of the build environment
    pub program: OsString,
    /// Arguments passed to the program, empty by default
    pub args: Vec<OsString>,
}

impl BuildCommand {
    /// Create a command without arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments to the command.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .join(" ");
        f.write_str(&parts)
    }
}

/// Result of running the build command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Exit code of the process, `None` if it was terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output, one line per output line
    pub stdout: String,
    /// Captured standard error, one line per output line
    pub stderr: String,
}

impl BuildOutput {
    /// Create an output from an exit code without captured output.
    pub fn from_exit_code(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    /// Whether the build command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        assert_eq!(BuildCommand::new("eb").to_string(), "eb");
        assert_eq!(
            BuildCommand::new("eb")
                .with_args(["--robot", "zlib-1.2.11.eb"])
                .to_string(),
            "eb --robot zlib-1.2.11.eb"
        );
    }

    #[test]
    fn test_output_success() {
        assert!(BuildOutput::from_exit_code(0).success());
        assert!(!BuildOutput::from_exit_code(2).success());
        assert!(!BuildOutput::default().success());
    }
}
