//! Final write decisions.
//!
//! The render pipeline only computes what each file should look like; a
//! [`FileWriter`] decides whether it actually lands on disk.

use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::BACKUP_DIR;
use crate::error::Result;

/// Everything the pipeline knows about one output file.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    /// Output path, relative to the project root.
    pub path: &'a Path,
    pub create_once: bool,
    pub skip_tags: &'a BTreeSet<String>,
    pub content: &'a [u8],
    pub record: bool,
    /// Set when the file was force-skipped, left inside a false conditional,
    /// or carries a skip tag its project or package opted out of.
    pub skip: bool,
    pub perm: u32,
}

/// Receives the output of the render pipeline.
pub trait FileWriter {
    fn write(&mut self, request: WriteRequest<'_>) -> Result<()>;
}

impl<F> FileWriter for F
where
    F: FnMut(WriteRequest<'_>) -> Result<()>,
{
    fn write(&mut self, request: WriteRequest<'_>) -> Result<()> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Created,
    Updated,
    Unchanged,
    /// Exists already and is only created once.
    Kept,
    Skipped,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WriteAction::Created => "Created",
            WriteAction::Updated => "Updated",
            WriteAction::Unchanged => "Unchanged",
            WriteAction::Kept => "Kept",
            WriteAction::Skipped => "Skipped",
        };
        f.write_str(text)
    }
}

/// Writes files below a project root, honouring skip tags, create-once
/// files and recording into the git index when the root is a repository.
pub struct FsWriter {
    root: PathBuf,
    skips: Vec<String>,
    repo: Option<git2::Repository>,
    actions: Vec<(WriteAction, PathBuf)>,
}

impl FsWriter {
    /// `skips` are the tags the project opted out of.
    pub fn new<P: Into<PathBuf>>(root: P, skips: Vec<String>) -> Self {
        let root = root.into();
        let repo = git2::Repository::open(&root).ok();
        if repo.is_none() {
            debug!("{} is not a git repository, nothing will be recorded", root.display());
        }
        Self { root, skips, repo, actions: Vec::new() }
    }

    /// Decisions taken so far, in order.
    pub fn actions(&self) -> &[(WriteAction, PathBuf)] {
        &self.actions
    }

    fn decide(&self, request: &WriteRequest<'_>, target: &Path) -> Result<WriteAction> {
        if request.skip {
            return Ok(WriteAction::Skipped);
        }
        if let Some(tag) = request.skip_tags.iter().find(|tag| self.skips.contains(tag)) {
            debug!("Skipping {} (skip tag '{tag}')", request.path.display());
            return Ok(WriteAction::Skipped);
        }
        if !target.exists() {
            return Ok(WriteAction::Created);
        }
        if request.create_once {
            return Ok(WriteAction::Kept);
        }
        if fs::read(target)? == request.content {
            Ok(WriteAction::Unchanged)
        } else {
            Ok(WriteAction::Updated)
        }
    }

    fn record(&self, path: &Path) -> Result<()> {
        if let Some(repo) = &self.repo {
            let mut index = repo.index()?;
            index.add_path(path)?;
            index.write()?;
        }
        Ok(())
    }
}

impl FileWriter for FsWriter {
    fn write(&mut self, request: WriteRequest<'_>) -> Result<()> {
        let target = self.root.join(request.path);
        let action = self.decide(&request, &target)?;
        match action {
            WriteAction::Created | WriteAction::Updated => {
                write_with_mode(&target, request.content, request.perm)?
            }
            WriteAction::Unchanged => set_mode(&target, request.perm)?,
            WriteAction::Kept | WriteAction::Skipped => {}
        }
        if request.record && action != WriteAction::Skipped {
            self.record(request.path)?;
        }

        info!("{action}: '{}'", request.path.display());
        self.actions.push((action, request.path.to_path_buf()));
        Ok(())
    }
}

/// Mirror of the skeleton sources used for a render, kept for diffing.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    /// Backups go to `<state_dir>/skeleton`.
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self { root: state_dir.as_ref().join(BACKUP_DIR) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(&self, relative: &Path, content: &[u8], mode: u32) -> Result<()> {
        write_with_mode(&self.root.join(relative), content, mode)
    }
}

fn write_with_mode(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode != 0 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
