//! Execution of the external build command for hpc-build.
//!
//! The build tool is an opaque collaborator: it is started with an explicit
//! set of environment variables on top of the inherited environment, its
//! output is streamed to the log as it arrives, and the caller receives a
//! typed [`BuildOutput`] instead of a bare exit status.

mod command;
mod crlf;
mod runner;

pub use command::{BuildCommand, BuildOutput};
pub use crlf::{CrLfNormalizer, normalize_crlf};
pub use runner::{BuildRunner, ProcessRunner, run_process_streaming};
