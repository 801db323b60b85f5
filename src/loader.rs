//! Skeleton loading.
//!
//! A catalog root contains `projects/` and `packages/`, each holding one
//! directory per skeleton:
//!
//! ```text
//! projects/program/
//!   skeleton.toml     [skeleton] name, inherits; [file."<path>"] flags
//!   drom.toml         manifest fragment (package.toml for packages)
//!   src/main.ml       template files, any depth
//! ```
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::{IGNORE_FILE, RESERVED_FILES, SKELETON_FILE};
use crate::error::{Error, Result};
use crate::flags::parse_file_table;
use crate::ignore::parse_skelignore_file;
use crate::model::Kind;
use crate::skeleton::{resolve, Catalog, Skeleton, SkeletonFile};

/// Mode given to files whose permissions cannot be read.
const DEFAULT_MODE: u32 = 0o644;

/// A catalog root and whether it ships with skel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonSource {
    pub path: PathBuf,
    pub builtin: bool,
}

impl SkeletonSource {
    pub fn builtin<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), builtin: true }
    }

    pub fn user<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), builtin: false }
    }
}

fn parse_manifest(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::ManifestError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    DEFAULT_MODE
}

fn is_reserved(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    RESERVED_FILES.contains(&lower.as_str()) || file_name == IGNORE_FILE
}

/// Reads every template file below `dir`, sorted by relative path.
fn load_files(dir: &Path) -> Result<Vec<SkeletonFile>> {
    let ignored = parse_skelignore_file(dir)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        let file_type = entry.file_type();
        if !(file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_name = entry.file_name().to_string_lossy();
        if is_reserved(&file_name) || path.ends_with('~') || ignored.is_match(&path) {
            debug!("Ignoring {}", entry.path().display());
            continue;
        }

        // Symlinks are captured through their target.
        let content = fs::read(entry.path())?;
        let mode = fs::metadata(entry.path()).map(|m| file_mode(&m)).unwrap_or(DEFAULT_MODE);
        files.push(SkeletonFile { path, content, mode });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Loads the skeleton stored in `dir`.
///
/// # Errors
/// * `Error::ManifestError` if `skeleton.toml` is not valid TOML
/// * `Error::MissingNameError` if `skeleton.name` is absent
pub fn load_one<P: AsRef<Path>>(kind: Kind, dir: P, builtin: bool) -> Result<(String, Skeleton)> {
    let dir = dir.as_ref();
    let descriptor = dir.join(SKELETON_FILE);
    let table = parse_manifest(&descriptor)?;

    let header = table.get("skeleton").and_then(|v| v.as_table());
    let name = header
        .and_then(|h| h.get("name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MissingNameError { path: descriptor.display().to_string() })?
        .to_string();
    let inherits = header
        .and_then(|h| h.get("inherits"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let manifest_path = dir.join(kind.manifest_file());
    let manifest = match fs::read_to_string(&manifest_path) {
        Ok(text) => vec![text],
        Err(_) => {
            warn!("Skeleton '{name}' has no {}", kind.manifest_file());
            Vec::new()
        }
    };

    if table.contains_key("files") {
        warn!("{}: found [files] table, did you mean [file]?", descriptor.display());
    }
    let flags = match table.get("file") {
        Some(toml::Value::Table(file_table)) => parse_file_table(file_table),
        Some(_) => {
            warn!("{}: [file] must be a table", descriptor.display());
            Default::default()
        }
        None => Default::default(),
    };

    let files = load_files(dir)?;
    debug!("Loaded {kind} skeleton '{name}' ({} files) from {}", files.len(), dir.display());

    let skeleton = Skeleton { name: name.clone(), inherits, manifest, files, flags, builtin };
    Ok((name, skeleton))
}

/// Loads every skeleton found one level below `base_dir` into a catalog.
///
/// A skeleton that fails to load is reported and left out. When two
/// directories declare the same name, the one loaded last wins.
pub fn load_all<P: AsRef<Path>>(kind: Kind, base_dir: P, builtin: bool) -> Result<Catalog> {
    let base_dir = base_dir.as_ref();
    let mut catalog = Catalog::new();
    if !base_dir.is_dir() {
        debug!("No {kind} skeletons in {}", base_dir.display());
        return Ok(catalog);
    }

    let mut dirs = fs::read_dir(base_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join(SKELETON_FILE).is_file())
        .collect::<Vec<_>>();
    dirs.sort();

    for dir in dirs {
        match load_one(kind, &dir, builtin) {
            Ok((name, skeleton)) => insert(&mut catalog, name, skeleton),
            Err(e) => warn!("Skipping skeleton {}: {e}", dir.display()),
        }
    }
    Ok(catalog)
}

fn insert(catalog: &mut Catalog, name: String, skeleton: Skeleton) {
    if catalog.contains_key(&name) {
        debug!("Skeleton '{name}' overridden by a later definition");
    }
    catalog.insert(name, skeleton);
}

/// Lazily built catalogs, one per kind, kept for the whole run.
///
/// Not meant to be shared between threads.
#[derive(Debug, Default)]
pub struct SkeletonCache {
    sources: Vec<SkeletonSource>,
    projects: Option<Catalog>,
    packages: Option<Catalog>,
}

impl SkeletonCache {
    /// Later sources override earlier ones on name collision.
    pub fn new(sources: Vec<SkeletonSource>) -> Self {
        Self { sources, projects: None, packages: None }
    }

    /// Returns the catalog of `kind`, loading it on first use.
    pub fn catalog(&mut self, kind: Kind) -> Result<&Catalog> {
        let slot = match kind {
            Kind::Project => &mut self.projects,
            Kind::Package => &mut self.packages,
        };
        if slot.is_none() {
            let mut catalog = Catalog::new();
            for source in &self.sources {
                let loaded = load_all(kind, source.path.join(kind.subdir()), source.builtin)?;
                for (name, skeleton) in loaded {
                    insert(&mut catalog, name, skeleton);
                }
            }
            *slot = Some(catalog);
        }
        Ok(slot.get_or_insert_with(Catalog::new))
    }

    /// Returns the fully resolved skeleton `name` of `kind`.
    pub fn resolve(&mut self, kind: Kind, name: &str) -> Result<Skeleton> {
        let catalog = self.catalog(kind)?;
        resolve(kind, catalog, name)
    }
}
