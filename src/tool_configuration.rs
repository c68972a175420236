//! Site configuration for hpc-build.
//!
//! Every value that depends on the cluster layout lives here. The defaults
//! describe the Hydra cluster; a TOML file can override any of them.

use std::path::{Path, PathBuf};

use fs_err as fs;
use hpc_build_toolchain::ToolchainGeneration;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Errors while loading the site configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML or has unknown keys
    #[error("failed to parse configuration file {}", path.display())]
    #[diagnostic(help("see the `Configuration` fields for the supported keys"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Site configuration used by the launcher and the job submitter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Architecture the software stack is built for natively. Jobs on any
    /// other architecture get a widened module path.
    pub reference_arch: String,

    /// Generation that always comes first in a widened module path.
    pub reference_generation: ToolchainGeneration,

    /// Base of the module trees, `<base>/<os>/<arch>/modules/<generation>/<subdir>`.
    pub module_base: PathBuf,

    /// Subdirectory of a generation that holds the module files.
    pub module_subdir: String,

    /// How many of the most recent generations are added to a widened module path.
    pub module_generations: usize,

    /// Shared temporary directory of all build jobs on a node.
    pub shared_tmpdir: PathBuf,

    /// Variable that tells the build tool it runs in a managed build.
    pub build_flag_var: String,

    /// Locale of the build.
    pub lang: String,

    /// Directories below `PREFIX_EB` that are prepended to `PATH`.
    pub path_segments: Vec<String>,

    /// Directories below `PREFIX_EB` that are prepended to `PYTHONPATH`.
    pub pythonpath_segments: Vec<String>,

    /// The external build command.
    pub build_command: String,

    /// Cluster that jobs are submitted to when none is given.
    pub cluster: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            reference_arch: "skylake".to_string(),
            reference_generation: "2019a"
                .parse()
                .expect("2019a is a valid toolchain generation"),
            module_base: PathBuf::from("/apps/brussel"),
            module_subdir: "all".to_string(),
            module_generations: 6,
            shared_tmpdir: PathBuf::from("/tmp/eb-test-build"),
            build_flag_var: "VUB_HPC_BUILD".to_string(),
            lang: "C".to_string(),
            path_segments: vec!["easybuild-framework".to_string()],
            pythonpath_segments: vec![
                "easybuild-easyblocks".to_string(),
                "easybuild-framework".to_string(),
                "vsc-base/lib".to_string(),
            ],
            build_command: "eb".to_string(),
            cluster: "hydra".to_string(),
        }
    }
}

impl Configuration {
    /// Read the configuration from a TOML file. Missing keys keep their default.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the configuration from `path`, or use the defaults if there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// The module tree of the reference architecture for the given OS.
    pub fn module_root(&self, os: &str) -> PathBuf {
        self.module_base
            .join(os)
            .join(&self.reference_arch)
            .join("modules")
    }
}
