//! Command-line options.

use std::path::PathBuf;

use clap::{Parser, crate_version};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::console_utils::Color;

/// Application subcommands.
#[derive(Parser)]
pub enum SubCommands {
    /// Prepare the build environment and run the build command.
    ///
    /// This is the body of a build job. It needs `PREFIX_EB` to point to the
    /// EasyBuild installation and uses `SLURM_JOB_ID`, `VSC_ARCH_LOCAL` and
    /// `VSC_OS_LOCAL` when present.
    Launch(LaunchOpts),

    /// Submit a build job for an easyconfig to the cluster
    Submit(SubmitOpts),
}

#[allow(missing_docs)]
#[derive(Parser)]
#[clap(version = crate_version!())]
pub struct App {
    /// Subcommand.
    #[clap(subcommand)]
    pub subcommand: SubCommands,

    /// Enable verbose logging.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// The site configuration file to use
    #[arg(long, env = "HPC_BUILD_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    /// Enable or disable colored output.
    #[clap(long, env = "HPC_BUILD_COLOR", default_value = "auto", global = true)]
    pub color: Color,
}

/// Options for the `launch` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct LaunchOpts {
    /// Build command to run instead of the one from the configuration
    #[arg(long)]
    pub build_command: Option<String>,

    /// Append the output of the build command to this file instead of
    /// `hpc-build.log` in the build directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Arguments passed on to the build command
    #[arg(last = true)]
    pub build_args: Vec<String>,
}

/// Options for the `submit` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SubmitOpts {
    /// The easyconfig to build
    pub easyconfig: String,

    /// EasyBuild installation used inside the job
    #[arg(long, env = "PREFIX_EB")]
    pub prefix_eb: String,

    /// Architecture of the nodes the job runs on
    #[arg(long, env = "VSC_ARCH_LOCAL")]
    pub host_arch: Option<String>,

    /// Architecture to build for, if different from the host
    #[arg(long)]
    pub target_arch: Option<String>,

    /// Toolchain generation of the easyconfig, detected from its name if not given
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Cluster to submit to [default: from the configuration]
    #[arg(long)]
    pub cluster: Option<String>,

    /// Partition of the job
    #[arg(long, help_heading = "Job resources")]
    pub partition: Option<String>,

    /// Time limit of the job
    #[arg(long, default_value = "23:59:59", help_heading = "Job resources")]
    pub walltime: String,

    /// Number of nodes
    #[arg(long, default_value_t = 1, help_heading = "Job resources")]
    pub nodes: u32,

    /// Number of tasks
    #[arg(long, default_value_t = 1, help_heading = "Job resources")]
    pub ntasks: u32,

    /// GPUs per node
    #[arg(long, help_heading = "Job resources")]
    pub gpus: Option<u32>,

    /// Extra options passed to `sbatch`
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub sub_options: String,

    /// Run the job script on this machine instead of submitting it
    #[arg(long)]
    pub local: bool,

    /// Print the submission command without submitting
    #[arg(long)]
    pub dry_run: bool,

    /// Do not delete the job script after submission
    #[arg(long)]
    pub keep_job: bool,

    /// Extra arguments for the build command, after the easyconfig
    #[arg(last = true)]
    pub build_args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        App::command().debug_assert();
    }

    #[test]
    fn test_parse_launch() {
        let app = App::try_parse_from(["hpc-build", "launch", "--", "--robot", "zlib.eb"]).unwrap();
        let SubCommands::Launch(opts) = app.subcommand else {
            panic!("expected launch");
        };
        assert_eq!(opts.build_args, vec!["--robot", "zlib.eb"]);
        assert_eq!(opts.build_command, None);
    }

    #[test]
    fn test_parse_config_file() {
        let app = App::try_parse_from([
            "hpc-build",
            "launch",
            "--config-file",
            "/etc/hpc-build.toml",
        ])
        .unwrap();
        assert_eq!(app.config_file, Some(PathBuf::from("/etc/hpc-build.toml")));
    }

    #[test]
    fn test_parse_launch_without_arguments() {
        let app = App::try_parse_from(["hpc-build", "launch"]).unwrap();
        let SubCommands::Launch(opts) = app.subcommand else {
            panic!("expected launch");
        };
        assert!(opts.build_args.is_empty());
    }

    #[test]
    fn test_parse_submit() {
        let app = App::try_parse_from([
            "hpc-build",
            "submit",
            "zlib-1.2.11-GCCcore-10.3.0.eb",
            "--prefix-eb",
            "/apps/eb",
            "--gpus",
            "2",
            "--dry-run",
        ])
        .unwrap();
        let SubCommands::Submit(opts) = app.subcommand else {
            panic!("expected submit");
        };
        assert_eq!(opts.easyconfig, "zlib-1.2.11-GCCcore-10.3.0.eb");
        assert_eq!(opts.gpus, Some(2));
        assert_eq!(opts.nodes, 1);
        assert!(opts.dry_run);
        assert!(!opts.local);
    }
}
