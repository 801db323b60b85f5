//! Skeletons and their inheritance.
//!
//! A skeleton may name a parent of the same kind in `skeleton.inherits`.
//! Resolving walks up that chain and folds every ancestor into a single
//! self-contained skeleton, the child winning on every conflict.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::flags::FileFlags;
use crate::model::Kind;

/// One template file of a skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonFile {
    /// Path relative to the skeleton directory, `/`-separated.
    pub path: String,
    pub content: Vec<u8>,
    /// Permission bits of the source file.
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    pub name: String,
    /// Parent skeleton; always `None` once resolved.
    pub inherits: Option<String>,
    /// Raw manifest text, ancestors first.
    pub manifest: Vec<String>,
    /// Sorted by path, unique by path.
    pub files: Vec<SkeletonFile>,
    /// Flags declared in the `[file]` table, keyed by source path.
    pub flags: BTreeMap<String, FileFlags>,
    /// Loaded from a bundled catalog root.
    pub builtin: bool,
}

/// Skeletons of one kind, by name.
pub type Catalog = IndexMap<String, Skeleton>;

impl Skeleton {
    /// The merged manifest fragments as a single text.
    pub fn manifest_text(&self) -> String {
        self.manifest.join("\n")
    }

    pub fn file(&self, path: &str) -> Option<&SkeletonFile> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|index| &self.files[index])
    }
}

/// Merges two path-sorted file lists in one pass. On equal paths the entry of
/// `own` is kept and the one of `parent` dropped.
pub fn merge_files(own: Vec<SkeletonFile>, parent: Vec<SkeletonFile>) -> Vec<SkeletonFile> {
    let mut merged = Vec::with_capacity(own.len() + parent.len());
    let mut own = own.into_iter().peekable();
    let mut parent = parent.into_iter().peekable();

    loop {
        let order = match (own.peek(), parent.peek()) {
            (Some(a), Some(b)) => a.path.cmp(&b.path),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        match order {
            Ordering::Less => merged.extend(own.next()),
            Ordering::Greater => merged.extend(parent.next()),
            Ordering::Equal => {
                merged.extend(own.next());
                parent.next();
            }
        }
    }
    merged
}

/// Lays `own` over `parent`: every key of `own` keeps its value, the keys only
/// present in `parent` are inherited.
pub fn overlay_flags(
    own: BTreeMap<String, FileFlags>,
    parent: BTreeMap<String, FileFlags>,
) -> BTreeMap<String, FileFlags> {
    let mut result = parent;
    result.extend(own);
    result
}

/// Folds an already resolved `parent` into `own`.
pub fn merge(own: Skeleton, parent: Skeleton) -> Skeleton {
    let manifest = parent.manifest.into_iter().chain(own.manifest).collect::<Vec<_>>();
    Skeleton {
        name: own.name,
        inherits: None,
        manifest: vec![manifest.join("\n")],
        files: merge_files(own.files, parent.files),
        flags: overlay_flags(own.flags, parent.flags),
        builtin: false,
    }
}

/// Looks up `name` in `catalog` and folds in all its ancestors.
///
/// # Errors
/// * `Error::MissingSkeleton` if `name` or one of its ancestors is unknown
/// * `Error::InheritanceCycle` if the ancestry loops
pub fn resolve(kind: Kind, catalog: &Catalog, name: &str) -> Result<Skeleton> {
    let mut visiting = HashSet::new();
    resolve_rec(kind, catalog, name, &mut visiting)
}

fn resolve_rec<'a>(
    kind: Kind,
    catalog: &'a Catalog,
    name: &'a str,
    visiting: &mut HashSet<&'a str>,
) -> Result<Skeleton> {
    let skeleton = catalog
        .get(name)
        .ok_or_else(|| Error::MissingSkeleton { kind, name: name.to_string() })?;
    let Some(parent_name) = skeleton.inherits.as_deref() else {
        return Ok(skeleton.clone());
    };
    if !visiting.insert(name) {
        return Err(Error::InheritanceCycle { kind, name: name.to_string() });
    }
    let parent = resolve_rec(kind, catalog, parent_name, visiting)?;
    visiting.remove(name);
    Ok(merge(skeleton.clone(), parent))
}
