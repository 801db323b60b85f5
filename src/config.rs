//! Run configuration.
//! Collects the catalog roots and the project locations from the command line
//! and the environment.

use log::debug;
use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{PROJECT_MANIFEST, SHARE_DIR_ENV, STATE_DIR};
use crate::loader::SkeletonSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Catalog roots, bundled ones first.
    pub sources: Vec<SkeletonSource>,
}

impl Config {
    /// Builds the catalog list from `$SKEL_SHARE_DIR` followed by `user_dirs`.
    pub fn new(user_dirs: &[PathBuf]) -> Self {
        let share = env::var_os(SHARE_DIR_ENV);
        Self::with_share_dirs(share.as_deref(), user_dirs)
    }

    /// Same as [`Config::new`] with the share directory list given explicitly.
    pub fn with_share_dirs(share: Option<&std::ffi::OsStr>, user_dirs: &[PathBuf]) -> Self {
        let mut sources: Vec<SkeletonSource> = share
            .map(|dirs| env::split_paths(dirs).map(SkeletonSource::builtin).collect())
            .unwrap_or_default();
        sources.extend(user_dirs.iter().cloned().map(SkeletonSource::user));
        debug!("Catalog roots: {sources:?}");
        Self { sources }
    }
}

/// Location of the project description when none is given.
pub fn default_project_file<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join(PROJECT_MANIFEST)
}

/// State directory of the project rooted at `root`.
pub fn state_dir<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join(STATE_DIR)
}
