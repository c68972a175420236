//! Running the build command as a child process.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use indexmap::IndexMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::command::{BuildCommand, BuildOutput};
use crate::crlf::normalize_crlf;

/// Something that can run the build command.
///
/// The launcher only talks to the build tool through this trait so that a
/// fake implementation can stand in for the real process in tests.
pub trait BuildRunner {
    /// Run `command` in `work_dir` with `env_vars` set on top of the inherited
    /// environment.
    fn run(
        &self,
        command: &BuildCommand,
        env_vars: &IndexMap<String, String>,
        work_dir: &Path,
    ) -> impl Future<Output = io::Result<BuildOutput>>;
}

/// Runs the build command as a real child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// File the build output is appended to, in addition to the log
    pub log_file: Option<PathBuf>,
}

impl ProcessRunner {
    /// Runner that also appends all output lines to `log_file`.
    pub fn with_log_file(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: Some(log_file.into()),
        }
    }
}

impl BuildRunner for ProcessRunner {
    async fn run(
        &self,
        command: &BuildCommand,
        env_vars: &IndexMap<String, String>,
        work_dir: &Path,
    ) -> io::Result<BuildOutput> {
        run_process_streaming(command, env_vars, work_dir, self.log_file.as_deref()).await
    }
}

/// Spawns the command and forwards every line it prints.
///
/// Stdout and stderr are read concurrently and captured. Lines are written
/// to the stream of this process they came from, independent of the log
/// level, and appended to `log_file` when one is given. Problems with the log
/// file are reported as warnings and never fail the build.
pub async fn run_process_streaming(
    command: &BuildCommand,
    env_vars: &IndexMap<String, String>,
    cwd: &Path,
    log_file: Option<&Path>,
) -> io::Result<BuildOutput> {
    let mut log_file = match log_file {
        Some(path) => match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
        {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Failed to open build log {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    tracing::debug!("Running `{}` in {}", command, cwd.display());

    let mut child = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .envs(env_vars)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stdout of build command"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stderr of build command"))?;

    let mut stdout_lines = tokio::io::BufReader::new(normalize_crlf(stdout)).lines();
    let mut stderr_lines = tokio::io::BufReader::new(normalize_crlf(stderr)).lines();

    let mut output = BuildOutput::default();
    let mut closed = (false, false);
    let mut own_stdout = tokio::io::stdout();
    let mut own_stderr = tokio::io::stderr();

    while closed != (true, true) {
        let (line, is_stderr) = tokio::select! {
            line = stdout_lines.next_line(), if !closed.0 => (line, false),
            line = stderr_lines.next_line(), if !closed.1 => (line, true),
        };

        match line {
            Ok(Some(line)) => {
                let line = format!("{line}\n");
                let forwarded = if is_stderr {
                    output.stderr.push_str(&line);
                    own_stderr.write_all(line.as_bytes()).await
                } else {
                    output.stdout.push_str(&line);
                    own_stdout.write_all(line.as_bytes()).await
                };
                if let Err(e) = forwarded {
                    tracing::debug!("Failed to forward build output: {:?}", e);
                }

                if let Some(file) = log_file.as_mut()
                    && let Err(e) = file.write_all(line.as_bytes()).await
                {
                    tracing::warn!("Failed to write to build log: {:?}", e);
                }
            }
            Ok(None) if is_stderr => closed.1 = true,
            Ok(None) => closed.0 = true,
            Err(e) => {
                tracing::warn!("Error reading build output: {:?}", e);
                break;
            }
        }
    }

    let status = child.wait().await?;
    output.exit_code = status.code();

    // forwarding is best effort
    let _ = own_stdout.flush().await;
    let _ = own_stderr.flush().await;

    if let Some(mut file) = log_file
        && let Err(e) = file.flush().await
    {
        tracing::warn!("Failed to flush build log: {:?}", e);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> BuildCommand {
        BuildCommand::new("sh").with_args(["-c", script])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessRunner::default()
            .run(
                &sh("echo out; echo err >&2; exit 3"),
                &IndexMap::new(),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_vars_and_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut env_vars = IndexMap::new();
        env_vars.insert("LANG".to_string(), "C".to_string());

        let output = ProcessRunner::default()
            .run(&sh("echo $LANG; pwd"), &env_vars, dir.path())
            .await
            .unwrap();

        assert!(output.success());
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("C"));
        let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_appended_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("build.log");
        std::fs::write(&log_file, "previous\n").unwrap();

        ProcessRunner::with_log_file(&log_file)
            .run(&sh("printf 'a\\r\\nb\\n'"), &IndexMap::new(), dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&log_file).unwrap(), "previous\na\nb\n");
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::default()
            .run(
                &BuildCommand::new("hpc-build-no-such-program"),
                &IndexMap::new(),
                dir.path(),
            )
            .await;
        assert!(result.is_err());
    }
}
