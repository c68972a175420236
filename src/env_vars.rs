//! Environment variables read by the launcher and exported to the build.
//!
//! The launcher never changes its own process environment. It takes a
//! snapshot of the variables it needs ([`LaunchInputs`]) and computes the set
//! of variables the build command is started with.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::consts::{self, PATH_LIST_SEPARATOR};
use crate::tool_configuration::Configuration;

macro_rules! insert {
    ($map:expr, $key:expr, $value:expr) => {
        $map.insert($key.to_string(), $value.to_string());
    };
}

/// A variable the launcher reads has a value it cannot pass on unchanged.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("the environment variable `{0}` is not valid UTF-8")]
pub struct NonUnicodeVariable(pub String);

/// Variables read into [`LaunchInputs`].
const INPUT_VARS: [&str; 8] = [
    consts::PREFIX_EB,
    consts::SLURM_JOB_ID,
    consts::VSC_ARCH_LOCAL,
    consts::VSC_OS_LOCAL,
    consts::USER,
    consts::TMPDIR,
    consts::PATH,
    consts::PYTHONPATH,
];

/// Snapshot of the environment variables the launcher depends on.
///
/// Empty values are treated the same as unset ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchInputs {
    pub prefix_eb: Option<String>,
    pub slurm_job_id: Option<String>,
    pub arch_local: Option<String>,
    pub os_local: Option<String>,
    pub user: Option<String>,
    pub tmpdir: Option<String>,
    pub path: Option<String>,
    pub pythonpath: Option<String>,
}

impl LaunchInputs {
    /// Read the inputs from the environment of the current process.
    pub fn from_env() -> Result<Self, NonUnicodeVariable> {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Build the inputs from raw `(name, value)` pairs.
    ///
    /// Variables the launcher does not read may hold anything. A value of a
    /// variable it reads must be valid UTF-8.
    pub fn from_os_vars<I>(vars: I) -> Result<Self, NonUnicodeVariable>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut inputs = Vec::new();
        for (name, value) in vars {
            let Some(name) = name.to_str().filter(|name| INPUT_VARS.contains(name)) else {
                continue;
            };
            let value = value
                .into_string()
                .map_err(|_| NonUnicodeVariable(name.to_string()))?;
            inputs.push((name.to_string(), value));
        }
        Ok(Self::from_vars(inputs))
    }

    /// Build the inputs from a list of `(name, value)` pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        Self {
            prefix_eb: vars.remove(consts::PREFIX_EB),
            slurm_job_id: vars.remove(consts::SLURM_JOB_ID),
            arch_local: vars.remove(consts::VSC_ARCH_LOCAL),
            os_local: vars.remove(consts::VSC_OS_LOCAL),
            user: vars.remove(consts::USER),
            tmpdir: vars.remove(consts::TMPDIR),
            path: vars.remove(consts::PATH),
            pythonpath: vars.remove(consts::PYTHONPATH),
        }
    }

    /// Whether the launcher runs inside a Slurm job.
    pub fn in_job(&self) -> bool {
        self.slurm_job_id.is_some()
    }
}

/// Prepend `entries` to a colon separated search path.
///
/// An unset or empty `existing` list yields just the new entries.
pub fn prepend_path_list<S: AsRef<str>>(entries: &[S], existing: Option<&str>) -> String {
    entries
        .iter()
        .map(|entry| entry.as_ref())
        .chain(existing.filter(|list| !list.is_empty()))
        .join(&PATH_LIST_SEPARATOR.to_string())
}

fn prefixed_segments(prefix_eb: &str, segments: &[String]) -> Vec<String> {
    segments
        .iter()
        .map(|segment| Path::new(prefix_eb).join(segment).display().to_string())
        .collect()
}

/// Variables that configure the build tool and its search paths.
///
/// Variables:
/// - the build flag (`VUB_HPC_BUILD=1` by default)
/// - `LANG`: locale of the build
/// - `PATH`: prefixed with the tool directories below `PREFIX_EB`
/// - `PYTHONPATH`: prefixed with the library directories below `PREFIX_EB`
pub fn build_vars(
    prefix_eb: &str,
    inputs: &LaunchInputs,
    config: &Configuration,
) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();

    insert!(vars, config.build_flag_var, "1");
    insert!(vars, consts::LANG, config.lang);

    let path = prepend_path_list(
        &prefixed_segments(prefix_eb, &config.path_segments),
        inputs.path.as_deref(),
    );
    insert!(vars, consts::PATH, path);

    let pythonpath = prepend_path_list(
        &prefixed_segments(prefix_eb, &config.pythonpath_segments),
        inputs.pythonpath.as_deref(),
    );
    insert!(vars, consts::PYTHONPATH, pythonpath);

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_vars_ignores_empty_values() {
        let inputs = LaunchInputs::from_vars([
            ("PREFIX_EB", ""),
            ("SLURM_JOB_ID", "1234"),
            ("VSC_ARCH_LOCAL", "broadwell"),
            ("HOME", "/home/vsc10000"),
        ]);
        assert_eq!(inputs.prefix_eb, None);
        assert_eq!(inputs.slurm_job_id.as_deref(), Some("1234"));
        assert_eq!(inputs.arch_local.as_deref(), Some("broadwell"));
        assert!(inputs.in_job());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_os_vars_rejects_non_unicode_input() {
        use std::os::unix::ffi::OsStringExt;

        let broken = || OsString::from_vec(b"/opt/caf\xe9/bin".to_vec());

        let err = LaunchInputs::from_os_vars([
            (OsString::from("PREFIX_EB"), OsString::from("/apps/eb")),
            (OsString::from("PATH"), broken()),
        ])
        .unwrap_err();
        assert_eq!(err, NonUnicodeVariable("PATH".to_string()));

        let inputs = LaunchInputs::from_os_vars([
            (OsString::from("PREFIX_EB"), OsString::from("/apps/eb")),
            (OsString::from("UNRELATED"), broken()),
        ])
        .unwrap();
        assert_eq!(inputs.prefix_eb.as_deref(), Some("/apps/eb"));
    }

    #[rstest]
    #[case(None, "/a:/b")]
    #[case(Some(""), "/a:/b")]
    #[case(Some("/usr/bin"), "/a:/b:/usr/bin")]
    #[case(Some("/usr/bin:/bin"), "/a:/b:/usr/bin:/bin")]
    fn test_prepend_path_list(#[case] existing: Option<&str>, #[case] expected: &str) {
        assert_eq!(prepend_path_list(&["/a", "/b"], existing), expected);
    }

    #[test]
    fn test_build_vars() {
        let inputs = LaunchInputs::from_vars([
            ("PATH", "/usr/bin:/bin"),
            ("PYTHONPATH", "/opt/python"),
        ]);
        let vars = build_vars("/apps/eb", &inputs, &Configuration::default());

        assert_eq!(vars["VUB_HPC_BUILD"], "1");
        assert_eq!(vars["LANG"], "C");
        assert_eq!(vars["PATH"], "/apps/eb/easybuild-framework:/usr/bin:/bin");
        assert_eq!(
            vars["PYTHONPATH"],
            "/apps/eb/easybuild-easyblocks:/apps/eb/easybuild-framework:/apps/eb/vsc-base/lib:/opt/python"
        );
        assert_eq!(
            vars.keys().collect::<Vec<_>>(),
            vec!["VUB_HPC_BUILD", "LANG", "PATH", "PYTHONPATH"]
        );
    }
}
