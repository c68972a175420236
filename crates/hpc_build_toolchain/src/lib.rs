//! Toolchain generations for EasyBuild based software stacks.
//!
//! A toolchain generation is a dated release name such as `2019a` or `2023b`.
//! Module trees are laid out with one directory per generation, and easyconfig
//! file names usually carry the generation they were written for.

mod generation;
mod job_name;

pub use generation::{
    SUBTOOLCHAINS, ToolchainError, ToolchainGeneration, detect_generation, find_generations,
};
pub use job_name::job_name;
