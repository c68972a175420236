//! Module path widening for builds on a non-reference architecture.
//!
//! Software for the reference architecture is installed in one module tree
//! per toolchain generation. When a build runs on another architecture, the
//! modules of the reference architecture are made visible as well: the
//! reference generation first, then the most recent generations.

use std::path::{Path, PathBuf};

use fs_err as fs;
use hpc_build_toolchain::ToolchainGeneration;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::consts::PATH_LIST_SEPARATOR;
use crate::tool_configuration::Configuration;

/// Errors while computing the module path.
#[derive(Debug, Error, Diagnostic)]
pub enum ModulePathError {
    /// The module tree could not be listed
    #[error("failed to read module tree {}", path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS of the node is needed to find the module tree
    #[error("the environment variable `VSC_OS_LOCAL` is not set")]
    #[diagnostic(help(
        "the module tree of the reference architecture depends on the OS of the node"
    ))]
    MissingOs,
}

/// Generations in `root` that have a module tree, most recent first.
///
/// Only directories named like a toolchain generation (`2019a`, `2021b`, ...)
/// that contain `subdir` are considered. At most `limit` generations are
/// returned.
pub fn dated_module_dirs(
    root: &Path,
    subdir: &str,
    limit: usize,
) -> Result<Vec<ToolchainGeneration>, ModulePathError> {
    let unreadable = |source| ModulePathError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    };

    let mut generations = Vec::new();
    for entry in fs::read_dir(root).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let name = entry.file_name();
        let Some(generation) = name
            .to_str()
            .and_then(|name| name.parse::<ToolchainGeneration>().ok())
        else {
            tracing::trace!("Ignoring {} in module tree", entry.path().display());
            continue;
        };
        if entry.path().join(subdir).is_dir() {
            generations.push(generation);
        } else {
            tracing::debug!(
                "Ignoring {}, it has no {} module directory",
                entry.path().display(),
                subdir
            );
        }
    }

    generations.sort_unstable_by(|a, b| b.cmp(a));
    generations.truncate(limit);
    Ok(generations)
}

/// Whether builds on `arch_local` need the modules of the reference architecture.
pub fn needs_widening(arch_local: Option<&str>, config: &Configuration) -> bool {
    arch_local != Some(config.reference_arch.as_str())
}

/// Compute the widened module path.
///
/// Returns `None` when the node has the reference architecture, in which case
/// the existing module path must stay as it is.
pub fn widened_module_path(
    arch_local: Option<&str>,
    os_local: Option<&str>,
    config: &Configuration,
) -> Result<Option<String>, ModulePathError> {
    if !needs_widening(arch_local, config) {
        tracing::debug!(
            "Running on reference architecture {}, keeping module path",
            config.reference_arch
        );
        return Ok(None);
    }

    let os_local = os_local.ok_or(ModulePathError::MissingOs)?;
    let root = config.module_root(os_local);
    let module_dir = |generation: &ToolchainGeneration| {
        root.join(generation.as_str())
            .join(&config.module_subdir)
            .display()
            .to_string()
    };

    let recent = dated_module_dirs(&root, &config.module_subdir, config.module_generations)?;
    if recent.len() < config.module_generations {
        tracing::debug!(
            "Only {} generations found in {}",
            recent.len(),
            root.display()
        );
    }

    let module_path = std::iter::once(&config.reference_generation)
        .chain(recent.iter())
        .map(module_dir)
        .join(&PATH_LIST_SEPARATOR.to_string());

    tracing::info!(
        "Architecture {} differs from {}, using modules of {}",
        arch_local.unwrap_or("<unknown>"),
        config.reference_arch,
        root.display()
    );

    Ok(Some(module_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_tree(generations: &[&str]) -> (tempfile::TempDir, Configuration) {
        let base = tempfile::tempdir().unwrap();
        let config = Configuration {
            module_base: base.path().to_path_buf(),
            ..Configuration::default()
        };
        let root = config.module_root("CO7");
        for generation in generations {
            fs::create_dir_all(root.join(generation).join("all")).unwrap();
        }
        (base, config)
    }

    #[test]
    fn test_dated_module_dirs_sorted_and_limited() {
        let (_base, config) = module_tree(&["2018a", "2021a", "2019b", "2020a", "2020b"]);
        let dirs = dated_module_dirs(&config.module_root("CO7"), "all", 3).unwrap();
        let names: Vec<_> = dirs.iter().map(|g| g.as_str()).collect();
        assert_eq!(names, vec!["2021a", "2020b", "2020a"]);
    }

    #[test]
    fn test_dated_module_dirs_skips_other_entries() {
        let (_base, config) = module_tree(&["2019a", "2020a", "system", "2020a.old"]);
        let root = config.module_root("CO7");
        fs::write(root.join("2021a"), "not a directory").unwrap();

        let dirs = dated_module_dirs(&root, "all", 6).unwrap();
        let names: Vec<_> = dirs.iter().map(|g| g.as_str()).collect();
        assert_eq!(names, vec!["2020a", "2019a"]);
    }

    #[test]
    fn test_generation_without_module_dir_is_skipped() {
        let (_base, config) = module_tree(&["2020a"]);
        let root = config.module_root("CO7");
        fs::create_dir_all(root.join("2022a")).unwrap();

        let dirs = dated_module_dirs(&root, "all", 6).unwrap();
        let names: Vec<_> = dirs.iter().map(|g| g.as_str()).collect();
        assert_eq!(names, vec!["2020a"]);

        let module_path = widened_module_path(Some("broadwell"), Some("CO7"), &config)
            .unwrap()
            .unwrap();
        assert!(!module_path.contains("2022a"));
        assert_eq!(
            module_path,
            format!(
                "{}:{}",
                root.join("2019a/all").display(),
                root.join("2020a/all").display()
            )
        );
    }

    #[test]
    fn test_dated_module_dirs_unreadable_root() {
        let base = tempfile::tempdir().unwrap();
        let err = dated_module_dirs(&base.path().join("missing"), "all", 6).unwrap_err();
        assert!(matches!(err, ModulePathError::UnreadableRoot { .. }));
    }

    #[test]
    fn test_reference_arch_keeps_module_path() {
        let config = Configuration::default();
        assert_eq!(
            widened_module_path(Some("skylake"), Some("CO7"), &config).unwrap(),
            None
        );
    }

    #[test]
    fn test_widened_module_path() {
        let generations = [
            "2017a", "2017b", "2018a", "2018b", "2019a", "2019b", "2020a", "2020b", "2021a",
        ];
        let (_base, config) = module_tree(&generations);
        let root = config.module_root("CO7");

        let module_path = widened_module_path(Some("broadwell"), Some("CO7"), &config)
            .unwrap()
            .unwrap();

        let expected = ["2019a", "2021a", "2020b", "2020a", "2019b", "2019a", "2018b"]
            .iter()
            .map(|generation| root.join(generation).join("all").display().to_string())
            .join(":");
        assert_eq!(module_path, expected);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_widened_module_path_with_few_generations() {
        let (_base, config) = module_tree(&["2020b"]);
        let root = config.module_root("CO7");

        let module_path = widened_module_path(None, Some("CO7"), &config)
            .unwrap()
            .unwrap();
        assert_eq!(
            module_path,
            format!(
                "{}:{}",
                root.join("2019a/all").display(),
                root.join("2020b/all").display()
            )
        );
        assert!(logs_contain("Only 1 generations found"));
    }

    #[test]
    fn test_widened_module_path_needs_os() {
        let config = Configuration::default();
        assert!(matches!(
            widened_module_path(Some("zen2"), None, &config),
            Err(ModulePathError::MissingOs)
        ));
    }
}
