//! Core render orchestration.
//!
//! For each file of a resolved skeleton the processor backs up the source,
//! works out the file's flags, substitutes its content and target path, and
//! hands the result to a [`FileWriter`]. Whether the file is finally written
//! is up to the writer.
//!
//! Project files are rendered in two passes. A file whose substitution
//! postpones (it references `late`) is retried once every other project and
//! package file has been handed over, with `late.files` listing them.

use log::{debug, info};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::condition::{Condition, PackageSubject};
use crate::error::{Error, Result};
use crate::flags::{FileFlags, FlagParser};
use crate::loader::SkeletonCache;
use crate::model::{Kind, Package, Project};
use crate::renderer::{NoBrackets, Substitutor, LATE_VARIABLE};
use crate::skeleton::{Skeleton, SkeletonFile};
use crate::writer::{BackupStore, FileWriter, WriteRequest};

/// What happened to one skeleton file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the writer under `path`.
    Handed { path: String, skip: bool },
    /// Deferred to the final pass.
    Postponed,
}

/// Where a file is rendered from.
struct Origin<'s> {
    skeleton: &'s Skeleton,
    subject: &'s dyn Condition,
    context: &'s Value,
    /// Package directory, `None` for project files.
    dir: Option<&'s Path>,
}

/// Render context of a project. `late` is only given in the final pass.
pub fn project_context(project: &Project, late: Option<&[String]>) -> Result<Value> {
    let mut context = serde_json::to_value(project)?;
    if let Value::Object(map) = &mut context {
        map.insert("skeleton".to_string(), Value::from(project.skeleton_name()));
        if let Some(files) = late {
            map.insert(LATE_VARIABLE.to_string(), json!({ "files": files }));
        }
    }
    Ok(context)
}

/// Render context of a package; the project is reachable as `project`.
pub fn package_context(project: &Project, package: &Package) -> Result<Value> {
    let mut context = serde_json::to_value(package)?;
    if let Value::Object(map) = &mut context {
        map.insert("skeleton".to_string(), Value::from(package.skeleton_name()));
        map.insert("project".to_string(), project_context(project, None)?);
    }
    Ok(context)
}

pub struct Processor<'a> {
    substitutor: &'a dyn Substitutor,
    backup: &'a BackupStore,
}

impl<'a> Processor<'a> {
    pub fn new(substitutor: &'a dyn Substitutor, backup: &'a BackupStore) -> Self {
        Self { substitutor, backup }
    }

    /// Renders the project skeleton, then the skeleton of every package,
    /// then the postponed project files.
    pub fn render_project(
        &self,
        project: &Project,
        cache: &mut SkeletonCache,
        writer: &mut dyn FileWriter,
    ) -> Result<()> {
        let skeleton = cache.resolve(Kind::Project, project.skeleton_name())?;
        info!("Rendering project '{}' with skeleton '{}'", project.name, skeleton.name);

        let context = project_context(project, None)?;
        let origin = Origin { skeleton: &skeleton, subject: project, context: &context, dir: None };
        let mut handed = Vec::new();
        let mut postponed = Vec::new();
        for file in &skeleton.files {
            match self.render_file(&origin, file, true, writer)? {
                Outcome::Handed { path, skip } => {
                    if !skip {
                        handed.push(path);
                    }
                }
                Outcome::Postponed => {
                    debug!("Postponing {}", file.path);
                    postponed.push(file);
                }
            }
        }

        for package in &project.packages {
            handed.extend(self.render_package(project, package, cache, writer)?);
        }

        if postponed.is_empty() {
            return Ok(());
        }
        let context = project_context(project, Some(&handed))?;
        let origin = Origin { context: &context, ..origin };
        for file in postponed {
            self.render_file(&origin, file, false, writer)?;
        }
        Ok(())
    }

    /// Renders the skeleton of one package below its directory. Returns the
    /// paths handed to the writer without a skip request.
    pub fn render_package(
        &self,
        project: &Project,
        package: &Package,
        cache: &mut SkeletonCache,
        writer: &mut dyn FileWriter,
    ) -> Result<Vec<String>> {
        let skeleton = cache.resolve(Kind::Package, package.skeleton_name())?;
        info!("Rendering package '{}' with skeleton '{}'", package.name, skeleton.name);

        let subject = PackageSubject::new(project, package);
        let context = package_context(project, package)?;
        let origin = Origin {
            skeleton: &skeleton,
            subject: &subject,
            context: &context,
            dir: Some(Path::new(&package.dir)),
        };

        let mut handed = Vec::new();
        for file in &skeleton.files {
            if let Outcome::Handed { path, skip: false } =
                self.render_file(&origin, file, false, writer)?
            {
                handed.push(path);
            }
        }
        Ok(handed)
    }

    fn render_file(
        &self,
        origin: &Origin<'_>,
        file: &SkeletonFile,
        allow_postpone: bool,
        writer: &mut dyn FileWriter,
    ) -> Result<Outcome> {
        debug!("Processing skeleton file {}", file.path);
        let backup_path = place(origin.dir, &file.path);
        self.backup.save(&backup_path, &file.content, file.mode)?;

        let mut flags = origin.skeleton.flags.get(&file.path).cloned().unwrap_or_default();
        let (content, target) = match self.substitute_file(origin, file, &mut flags) {
            Ok(rendered) => rendered,
            Err(Error::Postpone) if allow_postpone => return Ok(Outcome::Postponed),
            Err(Error::Postpone) => {
                return Err(Error::UnexpectedPostpone { file: file.path.clone() })
            }
            Err(e) => return Err(Error::FileError { file: file.path.clone(), source: Box::new(e) }),
        };
        flags.finalize_perm(&file.path, file.mode);

        let path = place(origin.dir, &target);
        let skip = flags.skip() || flags.skip_tags.iter().any(|tag| origin.subject.skips(tag));
        writer.write(WriteRequest {
            path: &path,
            create_once: flags.create_once,
            skip_tags: &flags.skip_tags,
            content: &content,
            record: flags.record,
            skip,
            perm: flags.perm,
        })?;
        Ok(Outcome::Handed { path: path.to_string_lossy().into_owned(), skip })
    }

    /// Returns the rendered content and the target path of `file`.
    fn substitute_file<'f>(
        &self,
        origin: &Origin<'_>,
        file: &'f SkeletonFile,
        flags: &mut FileFlags,
    ) -> Result<(Cow<'f, [u8]>, String)> {
        let content = match std::str::from_utf8(&file.content) {
            Ok(text) if flags.subst => {
                let mut parser = FlagParser::new(flags, origin.subject);
                let rendered = self.substitutor.substitute(text, origin.context, &mut parser)?;
                Cow::Owned(rendered.into_bytes())
            }
            Ok(_) => Cow::Borrowed(file.content.as_slice()),
            Err(_) => {
                debug!("{} is not UTF-8, copied verbatim", file.path);
                Cow::Borrowed(file.content.as_slice())
            }
        };

        let target = if flags.target.is_empty() {
            file.path.clone()
        } else {
            let rendered = self.substitutor.substitute(&flags.target, origin.context, &mut NoBrackets)?;
            rendered.trim().to_string()
        };
        check_target(&target)?;
        Ok((content, target))
    }
}

/// Targets stay below the project root or the package directory.
fn check_target(target: &str) -> Result<()> {
    let escapes = target.is_empty()
        || Path::new(target)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::InvalidTarget { target: target.to_string() });
    }
    Ok(())
}

fn place(dir: Option<&Path>, path: &str) -> PathBuf {
    match dir {
        Some(dir) => dir.join(path),
        None => PathBuf::from(path),
    }
}
