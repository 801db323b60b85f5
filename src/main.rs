//! skel's main application entry point and orchestration logic.
//! Handles command-line argument parsing and dispatches to the render,
//! list and show commands.

use anyhow::Context;
use std::path::{Path, PathBuf};

use skel::{
    cli::{get_args, Args, Command},
    config::{default_project_file, state_dir, Config},
    error::default_error_handler,
    loader::SkeletonCache,
    logger::init_logger,
    model::{Kind, Project},
    processor::Processor,
    renderer::MiniJinjaSubstitutor,
    writer::{BackupStore, FsWriter, WriteAction},
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::new(&args.skeletons);
    let mut cache = SkeletonCache::new(config.sources);

    match args.command {
        Command::Render { project, output } => render(&mut cache, project, &output),
        Command::List { kind } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![Kind::Project, Kind::Package],
            };
            for kind in kinds {
                list(&mut cache, kind)?;
            }
            Ok(())
        }
        Command::Show { name, kind } => show(&mut cache, kind, &name),
    }
}

/// Renders the project described by `project_file` into `root`.
///
/// # Flow
/// 1. Reads the project description
/// 2. Resolves the project skeleton and renders its files
/// 3. Renders the skeleton of every package
/// 4. Renders the files postponed during step 2
fn render(cache: &mut SkeletonCache, project_file: Option<PathBuf>, root: &Path) -> anyhow::Result<()> {
    let project_file = project_file.unwrap_or_else(|| default_project_file(root));
    let project = Project::from_file(&project_file)
        .with_context(|| format!("loading project file '{}'", project_file.display()))?;

    let substitutor = MiniJinjaSubstitutor::new();
    let backup = BackupStore::new(state_dir(root));
    let mut writer = FsWriter::new(root, project.skip.clone());

    Processor::new(&substitutor, &backup)
        .render_project(&project, cache, &mut writer)
        .with_context(|| format!("rendering project '{}'", project.name))?;

    let count = |wanted: WriteAction| writer.actions().iter().filter(|(a, _)| *a == wanted).count();
    println!(
        "Project '{}' rendered in {}: {} created, {} updated, {} skipped.",
        project.name,
        root.display(),
        count(WriteAction::Created),
        count(WriteAction::Updated),
        count(WriteAction::Skipped),
    );
    Ok(())
}

fn list(cache: &mut SkeletonCache, kind: Kind) -> anyhow::Result<()> {
    let catalog = cache.catalog(kind)?;
    println!("{kind} skeletons:");
    for (name, skeleton) in catalog {
        let parent = skeleton
            .inherits
            .as_deref()
            .map(|p| format!(" (inherits {p})"))
            .unwrap_or_default();
        let origin = if skeleton.builtin { " [builtin]" } else { "" };
        println!("  {name}{parent}{origin}");
    }
    Ok(())
}

fn show(cache: &mut SkeletonCache, kind: Kind, name: &str) -> anyhow::Result<()> {
    let skeleton = cache.resolve(kind, name)?;
    println!("{kind} skeleton '{}'", skeleton.name);
    for file in &skeleton.files {
        let declared = skeleton
            .flags
            .get(&file.path)
            .map(|flags| format!(" {flags:?}"))
            .unwrap_or_default();
        println!("  {:o} {}{declared}", file.mode, file.path);
    }
    let manifest = skeleton.manifest_text();
    if !manifest.trim().is_empty() {
        println!("manifest:\n{manifest}");
    }
    Ok(())
}
