//! File ignore pattern handling for skeleton directories.
//! This module processes .skelignore files to keep specific paths out of a
//! skeleton, similar to .gitignore functionality.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use std::{fs::read_to_string, path::Path};

pub use crate::constants::IGNORE_FILE;

/// Patterns applied to every skeleton, whether or not it has a .skelignore.
pub const DEFAULT_IGNORE_PATTERNS: [&str; 4] = ["*~", "**/.git", "**/.git/**", "**/.DS_Store"];

/// Reads the .skelignore file of a skeleton directory and combines it with
/// the default patterns.
///
/// # Arguments
/// * `skeleton_dir` - Directory of the skeleton
///
/// # Returns
/// * `Result<GlobSet>` - Set of compiled glob patterns matched against relative paths
///
/// # Notes
/// - If the .skelignore file doesn't exist, only the defaults apply
/// - Each non-empty line not starting with `#` is a separate glob pattern
/// - Invalid patterns will result in an IgnoreError
pub fn parse_skelignore_file<P: AsRef<Path>>(skeleton_dir: P) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORE_PATTERNS {
        builder.add(compile(pattern)?);
    }

    let ignore_path = skeleton_dir.as_ref().join(IGNORE_FILE);
    if let Ok(contents) = read_to_string(&ignore_path) {
        let patterns = contents.lines().map(str::trim);
        for line in patterns.filter(|l| !l.is_empty() && !l.starts_with('#')) {
            builder.add(compile(line)?);
        }
    } else {
        debug!("{} does not exist", ignore_path.display());
    }

    builder
        .build()
        .map_err(|e| Error::IgnoreError(format!("{IGNORE_FILE} loading failed: {e}")))
}

fn compile(pattern: &str) -> Result<Glob> {
    Glob::new(pattern)
        .map_err(|e| Error::IgnoreError(format!("{IGNORE_FILE} loading failed: {e}")))
}
