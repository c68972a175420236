//! hpc-build: EasyBuild build jobs for a Slurm cluster.
//!
//! `submit` renders a job script for an easyconfig and hands it to Slurm.
//! `launch` is what runs inside that job: it prepares the environment of the
//! build tool and runs it.

pub mod console_utils;
pub mod consts;
pub mod env_vars;
pub mod job_script;
pub mod launch;
pub mod module_path;
pub mod opt;
pub mod submit;
pub mod tool_configuration;

use std::path::Path;

use hpc_build_script::{BuildCommand, ProcessRunner};
use hpc_build_toolchain::{detect_generation, job_name};
use indicatif::MultiProgress;
use miette::IntoDiagnostic;

use crate::env_vars::LaunchInputs;
use crate::job_script::JobOptions;
use crate::opt::{LaunchOpts, SubmitOpts};
use crate::submit::{SubmitOptions, submit_build_job};
use crate::tool_configuration::Configuration;

/// Run the build job launcher with the environment of the current process.
///
/// The build output is appended to `hpc-build.log` in the build directory
/// unless another log file is given.
pub async fn launch_from_args(args: LaunchOpts, config: &Configuration) -> miette::Result<()> {
    let inputs = LaunchInputs::from_env()?;

    let program = args
        .build_command
        .unwrap_or_else(|| config.build_command.clone());
    let command = BuildCommand::new(program).with_args(args.build_args);

    let work_dir = std::env::current_dir().into_diagnostic()?;
    let log_file = args.log_file.unwrap_or_else(|| {
        Path::new(&launch::build_tmpdir(&inputs, config)).join(consts::BUILD_LOG_FILE)
    });
    let runner = ProcessRunner::with_log_file(log_file);

    launch::launch(&inputs, config, &command, &work_dir, &runner).await?;
    Ok(())
}

/// Build the job options for an easyconfig.
pub fn job_options_from_args(
    args: &SubmitOpts,
    launcher: std::path::PathBuf,
) -> miette::Result<JobOptions> {
    let generation =
        detect_generation(&args.easyconfig, args.toolchain.as_deref()).into_diagnostic()?;
    if generation.is_none() {
        tracing::warn!(
            "Could not determine the toolchain generation of {}",
            args.easyconfig
        );
    }

    let name = job_name(
        &args.easyconfig,
        args.host_arch.as_deref(),
        args.target_arch.as_deref(),
    );

    let mut job = JobOptions::new(name, args.prefix_eb.clone(), launcher);
    job.walltime = args.walltime.clone();
    job.nodes = args.nodes;
    job.tasks = args.ntasks;
    job.gpus = args.gpus;
    job.partition = args.partition.clone();
    job.toolchain_generation = generation;
    job.target_arch = args.target_arch.clone();
    job.build_args = std::iter::once(args.easyconfig.clone())
        .chain(args.build_args.iter().cloned())
        .collect();

    Ok(job)
}

/// Submit a build job for the easyconfig given on the command line.
pub async fn submit_from_args(
    args: SubmitOpts,
    config: &Configuration,
    multi_progress: &MultiProgress,
) -> miette::Result<()> {
    let launcher = std::env::current_exe().into_diagnostic()?;
    let job = job_options_from_args(&args, launcher)?;

    let options = SubmitOptions {
        sub_options: args.sub_options.clone(),
        cluster: args.cluster.clone().unwrap_or_else(|| config.cluster.clone()),
        local_exec: args.local,
        dry_run: args.dry_run,
    };

    tracing::info!("Submitting build job {}", console::style(&job.job_name).bold());
    let outcome = submit_build_job(&job, args.keep_job, &options, multi_progress).await?;

    if !outcome.success() {
        return Err(miette::miette!(
            "Job submission failed with exit code {}: {}",
            outcome.exit_code,
            outcome.output
        ));
    }

    if !args.dry_run && !args.local {
        tracing::info!(
            "{} job {} on cluster {}",
            console::style("Submitted").green(),
            outcome.output,
            options.cluster
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_job_options_from_args() {
        let args = SubmitOpts::try_parse_from([
            "submit",
            "/easyconfigs/z/zlib/zlib-1.2.11-GCCcore-10.3.0.eb",
            "--prefix-eb",
            "/apps/eb",
            "--host-arch",
            "skylake",
            "--target-arch",
            "zen2",
            "--",
            "--rebuild",
        ])
        .unwrap();

        let job = job_options_from_args(&args, PathBuf::from("/usr/bin/hpc-build")).unwrap();
        assert_eq!(job.job_name, "zlib-1.2.11-GCCcore-10.3.0-skylake-zen2");
        assert_eq!(job.toolchain_generation.unwrap().as_str(), "2021a");
        assert_eq!(
            job.build_args,
            vec!["/easyconfigs/z/zlib/zlib-1.2.11-GCCcore-10.3.0.eb", "--rebuild"]
        );
        assert_eq!(job.prefix_eb, "/apps/eb");
    }

    #[test]
    fn test_job_options_invalid_toolchain() {
        let args = SubmitOpts::try_parse_from([
            "submit",
            "zlib-1.2.11.eb",
            "--prefix-eb",
            "/apps/eb",
            "--toolchain",
            "2021c",
        ])
        .unwrap();

        assert!(job_options_from_args(&args, PathBuf::from("hpc-build")).is_err());
    }
}
