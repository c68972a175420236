use std::{collections::BTreeSet, fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pattern that every toolchain generation name follows.
pub const GENERATION_PATTERN: &str = r"20[1-2][0-9][ab]";

lazy_static! {
    static ref GENERATION_EXACT: Regex =
        Regex::new(&format!("^{GENERATION_PATTERN}$")).expect("valid generation regex");
    static ref GENERATION_ANYWHERE: Regex =
        Regex::new(GENERATION_PATTERN).expect("valid generation regex");
}

/// Sub-toolchains shipped with each generation, newest generation first.
///
/// Used to recover the generation of easyconfigs that are named after a
/// compiler (`GCCcore-12.3.0`) instead of a full toolchain (`foss-2023a`).
pub const SUBTOOLCHAINS: &[(&str, &[&str])] = &[
    (
        "2023a",
        &["GCCcore-12.3.0", "GCC-12.3.0", "intel-compilers-2023.1.0"],
    ),
    (
        "2022b",
        &["GCCcore-12.2.0", "GCC-12.2.0", "intel-compilers-2022.2.1"],
    ),
    (
        "2022a",
        &["GCCcore-11.3.0", "GCC-11.3.0", "intel-compilers-2022.1.0"],
    ),
    (
        "2021b",
        &["GCCcore-11.2.0", "GCC-11.2.0", "intel-compilers-2021.4.0"],
    ),
    (
        "2021a",
        &["GCCcore-10.3.0", "GCC-10.3.0", "intel-compilers-2021.2.0"],
    ),
    (
        "2020b",
        &["GCCcore-10.2.0", "GCC-10.2.0", "iccifort-2020.4.304"],
    ),
    (
        "2020a",
        &["GCCcore-9.3.0", "GCC-9.3.0", "iccifort-2020.1.217"],
    ),
    (
        "2019b",
        &["GCCcore-8.3.0", "GCC-8.3.0", "iccifort-2019.5.281"],
    ),
    (
        "2019a",
        &[
            "GCCcore-8.2.0",
            "GCC-8.2.0-2.31.1",
            "iccifort-2019.1.144-GCC-8.2.0-2.31.1",
        ],
    ),
    (
        "2018b",
        &[
            "GCCcore-7.3.0",
            "GCC-7.3.0-2.30",
            "iccifort-2018.3.222-GCC-7.3.0-2.30",
        ],
    ),
];

/// Errors that can occur when working with toolchain generations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
    /// The given string is not a toolchain generation.
    #[error("invalid toolchain generation '{0}', expected something like '2023a'")]
    InvalidGeneration(String),
}

/// A validated toolchain generation name, e.g. `2021b`.
///
/// Generations order the same way their names do, so sorting a list in
/// descending order yields the most recent generation first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolchainGeneration(String);

impl ToolchainGeneration {
    /// Returns the generation name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ToolchainGeneration {
    type Err = ToolchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if GENERATION_EXACT.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ToolchainError::InvalidGeneration(s.to_string()))
        }
    }
}

impl TryFrom<String> for ToolchainGeneration {
    type Error = ToolchainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolchainGeneration> for String {
    fn from(value: ToolchainGeneration) -> Self {
        value.0
    }
}

impl fmt::Display for ToolchainGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns all distinct generation names that occur in `text`.
///
/// Long easyconfig paths can mention the same generation more than once, the
/// result contains every generation a single time.
pub fn find_generations(text: &str) -> BTreeSet<ToolchainGeneration> {
    GENERATION_ANYWHERE
        .find_iter(text)
        .map(|m| ToolchainGeneration(m.as_str().to_string()))
        .collect()
}

/// Determine the toolchain generation of an easyconfig.
///
/// A `user_toolchain` takes precedence and must be a valid generation.
/// Otherwise the generation is taken from the easyconfig name when it
/// mentions exactly one, and finally from the sub-toolchain table.
pub fn detect_generation(
    easyconfig: &str,
    user_toolchain: Option<&str>,
) -> Result<Option<ToolchainGeneration>, ToolchainError> {
    if let Some(user_toolchain) = user_toolchain {
        let generation = user_toolchain.parse::<ToolchainGeneration>()?;
        tracing::debug!("Toolchain generation: {}", generation);
        return Ok(Some(generation));
    }

    let found = find_generations(easyconfig);
    let generation = if found.len() == 1 {
        found.into_iter().next()
    } else {
        SUBTOOLCHAINS
            .iter()
            .find(|(_, subtoolchains)| subtoolchains.iter().any(|tc| easyconfig.contains(tc)))
            .map(|(generation, _)| ToolchainGeneration(generation.to_string()))
    };

    match &generation {
        Some(generation) => tracing::debug!("Toolchain generation: {}", generation),
        None => tracing::debug!("Toolchain generation: none found in '{}'", easyconfig),
    }

    Ok(generation)
}
