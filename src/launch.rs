//! The build job launcher: the body of every build job.
//!
//! The launch runs in a fixed order: validate the inputs, configure the
//! build environment, establish the build directory, widen the module path
//! when needed, run the build command, and clean up after a failed build.

use std::path::{Path, PathBuf};

use fs_err as fs;
use hpc_build_script::{BuildCommand, BuildOutput, BuildRunner};
use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use crate::consts;
use crate::env_vars::{LaunchInputs, build_vars};
use crate::module_path::{ModulePathError, widened_module_path};
use crate::tool_configuration::Configuration;

/// Errors that abort a launch.
#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    /// `PREFIX_EB` is unset or empty
    #[error("the environment variable `PREFIX_EB` is not set")]
    #[diagnostic(help("set `PREFIX_EB` to the EasyBuild installation used for the build"))]
    MissingPrefix,

    /// A temporary directory could not be created
    #[error("failed to create build directory")]
    CreateDirectory(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ModulePath(#[from] ModulePathError),

    /// The build command did not finish successfully
    #[error("build command `{command}` {reason}")]
    BuildFailed { command: String, reason: String },
}

/// The environment a build command is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// Variables set on top of the inherited environment
    pub env_vars: IndexMap<String, String>,
    /// The temporary directory of the build (`TMPDIR`)
    pub tmpdir: PathBuf,
}

/// Check the inputs that must be present before anything else happens.
///
/// Returns the value of `PREFIX_EB`.
pub fn validate(inputs: &LaunchInputs) -> Result<&str, LaunchError> {
    inputs.prefix_eb.as_deref().ok_or(LaunchError::MissingPrefix)
}

/// The temporary directory of the build.
///
/// Outside a Slurm job every user gets a fixed directory below the shared
/// temporary directory. Inside a job the directory provided by Slurm is kept.
pub fn build_tmpdir(inputs: &LaunchInputs, config: &Configuration) -> String {
    if inputs.in_job()
        && let Some(tmpdir) = &inputs.tmpdir
    {
        return tmpdir.clone();
    }

    match &inputs.user {
        Some(user) => format!("{}/", config.shared_tmpdir.join(user).display()),
        None => format!("{}/", config.shared_tmpdir.display()),
    }
}

/// Create the temporary directories of the build. Existing directories are fine.
pub fn establish_build_directory(tmpdir: &Path, config: &Configuration) -> Result<(), LaunchError> {
    for dir in [tmpdir, config.shared_tmpdir.as_path()] {
        fs::create_dir_all(dir).map_err(LaunchError::CreateDirectory)?;
    }
    Ok(())
}

/// Prepare the build environment: everything up to, but not including, the
/// start of the build command.
///
/// Nothing is created on disk when `PREFIX_EB` is missing.
pub fn prepare(
    inputs: &LaunchInputs,
    config: &Configuration,
) -> Result<BuildEnvironment, LaunchError> {
    let prefix_eb = validate(inputs)?;

    let mut env_vars = build_vars(prefix_eb, inputs, config);

    let tmpdir = build_tmpdir(inputs, config);
    establish_build_directory(Path::new(&tmpdir), config)?;
    tracing::debug!("Using build directory {}", tmpdir);
    env_vars.insert(consts::TMPDIR.to_string(), tmpdir.clone());

    if let Some(module_path) = widened_module_path(
        inputs.arch_local.as_deref(),
        inputs.os_local.as_deref(),
        config,
    )? {
        env_vars.insert(consts::MODULEPATH.to_string(), module_path);
    }

    Ok(BuildEnvironment {
        env_vars,
        tmpdir: PathBuf::from(tmpdir),
    })
}

/// Remove the shared temporary directory after a failed build in a job.
///
/// Other jobs may remove the same directory concurrently, so any error is
/// only logged.
pub fn cleanup_after_failure(inputs: &LaunchInputs, config: &Configuration) {
    if !inputs.in_job() {
        return;
    }

    match fs::remove_dir_all(&config.shared_tmpdir) {
        Ok(()) => tracing::debug!("Removed {}", config.shared_tmpdir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Ignoring failed cleanup: {}", e),
    }
}

/// Run a complete build job.
///
/// On success the output of the build command is returned. A failed build
/// command is reported as [`LaunchError::BuildFailed`] after cleanup.
pub async fn launch<R: BuildRunner>(
    inputs: &LaunchInputs,
    config: &Configuration,
    command: &BuildCommand,
    work_dir: &Path,
    runner: &R,
) -> Result<BuildOutput, LaunchError> {
    let environment = prepare(inputs, config)?;

    tracing::info!("Running build command `{}`", command);
    let result = runner.run(command, &environment.env_vars, work_dir).await;

    let reason = match result {
        Ok(output) if output.success() => {
            tracing::info!("Build command finished successfully");
            return Ok(output);
        }
        Ok(output) => match output.exit_code {
            Some(code) => format!("failed with exit code {code}"),
            None => "was terminated by a signal".to_string(),
        },
        Err(e) => format!("could not be started: {e}"),
    };

    cleanup_after_failure(inputs, config);

    Err(LaunchError::BuildFailed {
        command: command.to_string(),
        reason,
    })
}
