//! Names of the environment variables the launcher reads and writes.

/// Root of the EasyBuild installation used for the build (required).
pub const PREFIX_EB: &str = "PREFIX_EB";
/// Job identifier assigned by Slurm, set only inside a job.
pub const SLURM_JOB_ID: &str = "SLURM_JOB_ID";
/// CPU architecture of the node the job runs on.
pub const VSC_ARCH_LOCAL: &str = "VSC_ARCH_LOCAL";
/// Operating system flavour of the node the job runs on.
pub const VSC_OS_LOCAL: &str = "VSC_OS_LOCAL";

pub const USER: &str = "USER";
pub const LANG: &str = "LANG";
pub const PATH: &str = "PATH";
pub const PYTHONPATH: &str = "PYTHONPATH";
pub const TMPDIR: &str = "TMPDIR";
pub const MODULEPATH: &str = "MODULEPATH";

/// Toolchain generation detected at submission time, exported by the job script.
pub const EB_TOOLCHAIN_GENERATION: &str = "EB_TOOLCHAIN_GENERATION";
/// Target architecture requested at submission time, exported by the job script.
pub const EB_TARGET_ARCH: &str = "EB_TARGET_ARCH";

/// Build log written to the build directory when no log file is given.
pub const BUILD_LOG_FILE: &str = "hpc-build.log";

/// Separator of search path lists such as `PATH` and `MODULEPATH`.
pub const PATH_LIST_SEPARATOR: char = ':';
