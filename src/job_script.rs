//! Rendering of the Slurm job script for a build.

use std::path::PathBuf;

use hpc_build_toolchain::ToolchainGeneration;
use miette::Diagnostic;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use thiserror::Error;

use crate::consts;

const JOB_TEMPLATE: &str = r#"#!/bin/bash -l
#SBATCH --job-name={{ job_name }}
#SBATCH --output="{{ output }}"
#SBATCH --error="{{ error }}"
#SBATCH --time={{ walltime }}
#SBATCH --nodes={{ nodes }}
#SBATCH --ntasks={{ tasks }}
{% if gpus %}#SBATCH --gpus-per-node={{ gpus }}
{% endif %}{% if partition %}#SBATCH --partition={{ partition }}
{% endif %}
export PREFIX_EB={{ prefix_eb | shell_quote }}
{% if toolchain_generation %}export {{ GENERATION_VAR }}={{ toolchain_generation }}
{% endif %}{% if target_arch %}export {{ TARGET_ARCH_VAR }}={{ target_arch | shell_quote }}
{% endif %}
exec {{ launcher | shell_quote }} launch{% if build_command %} --build-command {{ build_command | shell_quote }}{% endif %}{% if build_args %} --{% for arg in build_args %} {{ arg | shell_quote }}{% endfor %}{% endif %}
"#;

/// Errors while rendering a job script.
#[derive(Debug, Error, Diagnostic)]
pub enum JobScriptError {
    #[error("failed to render job script")]
    Render(#[from] minijinja::Error),
}

/// Everything that goes into a build job script.
#[derive(Debug, Clone, Serialize)]
pub struct JobOptions {
    /// Name of the job in the queue
    pub job_name: String,
    /// File pattern for the standard output of the job
    pub output: String,
    /// File pattern for the standard error of the job
    pub error: String,
    /// Time limit, in any format accepted by `sbatch --time`
    pub walltime: String,
    pub nodes: u32,
    pub tasks: u32,
    /// GPUs per node, no GPU directive when unset
    pub gpus: Option<u32>,
    /// Partition of the job, the cluster default when unset
    pub partition: Option<String>,
    /// EasyBuild installation exported as `PREFIX_EB`
    pub prefix_eb: String,
    /// The `hpc-build` executable that runs inside the job
    pub launcher: PathBuf,
    /// Build command to use instead of the configured one
    pub build_command: Option<String>,
    /// Arguments for the build command
    pub build_args: Vec<String>,
    pub toolchain_generation: Option<ToolchainGeneration>,
    pub target_arch: Option<String>,
}

impl JobOptions {
    /// Job options with the default resources for a single build.
    pub fn new(job_name: impl Into<String>, prefix_eb: impl Into<String>, launcher: PathBuf) -> Self {
        Self {
            job_name: job_name.into(),
            output: "%x-%j.out".to_string(),
            error: "%x-%j.err".to_string(),
            walltime: "23:59:59".to_string(),
            nodes: 1,
            tasks: 1,
            gpus: None,
            partition: None,
            prefix_eb: prefix_eb.into(),
            launcher,
            build_command: None,
            build_args: Vec::new(),
            toolchain_generation: None,
            target_arch: None,
        }
    }
}

/// Quote a value for use as a single word in a bash script.
pub fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+%@".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'\''"#))
    }
}

/// Render the job script for `options`.
pub fn render_job_script(options: &JobOptions) -> Result<String, JobScriptError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.add_filter("shell_quote", |value: String| shell_quote(&value));
    env.add_global("GENERATION_VAR", consts::EB_TOOLCHAIN_GENERATION);
    env.add_global("TARGET_ARCH_VAR", consts::EB_TARGET_ARCH);
    env.add_template("job.sh", JOB_TEMPLATE)?;

    let script = env.get_template("job.sh")?.render(options)?;
    Ok(script)
}
