//! Submission of build jobs to the cluster.

use std::path::{Path, PathBuf};

use fs_err as fs;
use hpc_build_script::{BuildCommand, run_process_streaming};
use indexmap::IndexMap;
use indicatif::MultiProgress;
use miette::Diagnostic;
use thiserror::Error;

use crate::console_utils;
use crate::job_script::{JobOptions, JobScriptError, render_job_script};

/// Errors while submitting a job.
#[derive(Debug, Error, Diagnostic)]
pub enum SubmitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    JobScript(#[from] JobScriptError),

    /// The job script could not be written
    #[error("failed to write job script")]
    WriteJobFile(#[source] std::io::Error),

    /// `bash` is needed to run the submission command
    #[error("could not find `bash`")]
    BashNotFound(#[from] which::Error),

    /// The submission command could not be started
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a job script is submitted.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Extra options passed to `sbatch`
    pub sub_options: String,
    /// Cluster module to load before submitting
    pub cluster: String,
    /// Run the job script on this machine instead of submitting it
    pub local_exec: bool,
    /// Only report the submission command
    pub dry_run: bool,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Exit code of the submission command (or of the job when run locally)
    pub exit_code: i32,
    /// Output of the submission command, the job id for `sbatch --parsable`
    pub output: String,
}

impl SubmitOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The shell command that submits `job_file` to the cluster.
pub fn submit_command(job_file: &Path, options: &SubmitOptions) -> String {
    let sbatch = [
        "sbatch --parsable",
        options.sub_options.trim(),
        &job_file.display().to_string(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

    [
        "module --force purge".to_string(),
        format!("module load cluster/{}", options.cluster),
        sbatch,
    ]
    .join(" && ")
}

/// Write a job script to a temporary file that outlives this process.
pub fn write_job_file(script: &str) -> Result<PathBuf, SubmitError> {
    let file = tempfile::Builder::new()
        .prefix("hpc-build-job-")
        .suffix(".sh")
        .tempfile()
        .map_err(SubmitError::WriteJobFile)?;
    fs::write(file.path(), script).map_err(SubmitError::WriteJobFile)?;
    let (_, path) = file.keep().map_err(|e| SubmitError::WriteJobFile(e.error))?;
    Ok(path)
}

/// Submit a job script to the cluster, run it locally, or only report what
/// would be done.
pub async fn submit_job_script(
    job_file: &Path,
    options: &SubmitOptions,
    multi_progress: &MultiProgress,
) -> Result<SubmitOutcome, SubmitError> {
    let submit_cmd = submit_command(job_file, options);

    if options.dry_run {
        let message = format!("(DRY RUN) Job submission command: {submit_cmd}");
        tracing::info!("{}", message);
        return Ok(SubmitOutcome {
            exit_code: 0,
            output: message,
        });
    }

    let bash = which::which("bash")?;

    if options.local_exec {
        tracing::debug!("Local execution of job script: {}", job_file.display());
        let command = BuildCommand::new(bash).with_args([job_file]);
        let cwd = std::env::current_dir().map_err(|source| SubmitError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let output = run_process_streaming(&command, &IndexMap::new(), &cwd, None)
            .await
            .map_err(|source| SubmitError::Spawn {
                command: command.to_string(),
                source,
            })?;
        return Ok(SubmitOutcome {
            exit_code: output.exit_code.unwrap_or(1),
            output: output.stdout + &output.stderr,
        });
    }

    tracing::debug!("Job submission command: {}", submit_cmd);
    let spinner = console_utils::spinner(
        multi_progress,
        format!("Submitting to cluster {}", options.cluster),
    );
    let output = tokio::process::Command::new(&bash)
        .arg("-c")
        .arg(&submit_cmd)
        .output()
        .await;
    spinner.finish_and_clear();

    let output = output.map_err(|source| SubmitError::Spawn {
        command: submit_cmd.clone(),
        source,
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(SubmitOutcome {
        exit_code: output.status.code().unwrap_or(1),
        output: text.trim().to_string(),
    })
}

/// Render the job script for `job`, submit it, and remove the script
/// afterwards unless `keep_job` is set.
pub async fn submit_build_job(
    job: &JobOptions,
    keep_job: bool,
    options: &SubmitOptions,
    multi_progress: &MultiProgress,
) -> Result<SubmitOutcome, SubmitError> {
    let script = render_job_script(job)?;
    let job_file = write_job_file(&script)?;
    tracing::debug!("Job script written to {}", job_file.display());

    let outcome = submit_job_script(&job_file, options, multi_progress).await;

    if keep_job {
        tracing::info!("Job script kept at {}", job_file.display());
    } else if let Err(e) = fs::remove_file(&job_file) {
        tracing::error!("Failed to remove job file: {}", e);
    }

    outcome
}
