use std::fs;
use std::path::{Path, PathBuf};

use skel::error::{Error, Result};
use skel::loader::{SkeletonCache, SkeletonSource};
use skel::model::{Package, Project};
use skel::processor::{package_context, project_context, Processor};
use skel::renderer::MiniJinjaSubstitutor;
use skel::writer::{BackupStore, FileWriter, FsWriter, WriteAction, WriteRequest};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Written {
    path: String,
    content: String,
    create_once: bool,
    skip_tags: Vec<String>,
    record: bool,
    skip: bool,
    perm: u32,
}

/// Keeps every request instead of touching the disk.
#[derive(Default)]
struct Collect(Vec<Written>);

impl Collect {
    fn get(&self, path: &str) -> &Written {
        self.0.iter().find(|w| w.path == path).unwrap_or_else(|| panic!("{path} not written"))
    }

    fn paths(&self) -> Vec<&str> {
        self.0.iter().map(|w| w.path.as_str()).collect()
    }
}

impl FileWriter for Collect {
    fn write(&mut self, request: WriteRequest<'_>) -> Result<()> {
        self.0.push(Written {
            path: request.path.to_string_lossy().into_owned(),
            content: String::from_utf8_lossy(request.content).into_owned(),
            create_once: request.create_once,
            skip_tags: request.skip_tags.iter().cloned().collect(),
            record: request.record,
            skip: request.skip,
            perm: request.perm,
        });
        Ok(())
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn make_skeleton(root: &Path, relative: &str, descriptor: &str, files: &[(&str, &str)]) {
    let dir = root.join(relative);
    write(&dir.join("skeleton.toml"), descriptor);
    for (path, content) in files {
        write(&dir.join(path), content);
    }
}

fn demo_catalog(root: &Path) {
    make_skeleton(
        root,
        "projects/base",
        r#"
[skeleton]
name = "base"

[file.LICENSE]
create = true
record = false
"#,
        &[("LICENSE", "Copyright !{ fields.owner }\n"), ("README.md", "overridden\n")],
    );
    make_skeleton(
        root,
        "projects/program",
        r#"
[skeleton]
name = "program"
inherits = "base"

[file."raw.txt"]
subst = false

[file."name.txt"]
file = "!{name}.txt"
"#,
        &[
            (
                "README.md",
                "# !{name}\n!(if:skip:docs)\nSee docs.\n!(fi)\n!(if:gen:docs)\nDocs enabled.\n!(fi)\n",
            ),
            ("raw.txt", "!{name} stays !(create)\n"),
            ("name.txt", "hello\n"),
            ("scripts/build.sh", "!(perm:644)\necho !{name}\n"),
            ("docs/index.md", "!(skip:docs)\nDocs for !{name}\n"),
            ("ci.yml", "!(if:ci:github)\nci\n"),
            ("FILES", "!(no-record)\n!{ late.files | join(\",\") }\n"),
        ],
    );
    make_skeleton(
        root,
        "packages/library",
        "[skeleton]\nname = \"library\"\n",
        &[
            ("dune", "(library (name !{ name }))\n!(if:pack)\n(wrapped true)\n!(fi)\n"),
            (
                "version.ml",
                "!(if:project:field:owner:ACME)\nlet owner = \"!{ project.fields.owner }\"\n!(fi)\n",
            ),
        ],
    );
}

fn demo_project() -> Project {
    let mut project = Project {
        name: "demo".to_string(),
        skip: vec!["docs".to_string()],
        ci_systems: vec!["gitlab".to_string()],
        edition: "2021".to_string(),
        packages: vec![Package {
            name: "demo_lib".to_string(),
            dir: "src/demo_lib".to_string(),
            pack_modules: true,
            ..Package::default()
        }],
        ..Project::default()
    };
    project.fields.insert("owner".to_string(), "ACME".to_string());
    project
}

struct Fixture {
    catalogs: TempDir,
    state: TempDir,
}

impl Fixture {
    fn new(populate: impl FnOnce(&Path)) -> Self {
        let catalogs = TempDir::new().unwrap();
        populate(catalogs.path());
        Self { catalogs, state: TempDir::new().unwrap() }
    }

    fn render(&self, project: &Project) -> Result<Collect> {
        let mut cache = SkeletonCache::new(vec![SkeletonSource::builtin(self.catalogs.path())]);
        let substitutor = MiniJinjaSubstitutor::new();
        let backup = BackupStore::new(self.state.path());
        let mut collect = Collect::default();
        Processor::new(&substitutor, &backup).render_project(project, &mut cache, &mut collect)?;
        Ok(collect)
    }
}

#[test_log::test]
fn test_render_project_order_and_postponement() {
    let fixture = Fixture::new(demo_catalog);
    let collect = fixture.render(&demo_project()).unwrap();

    assert_eq!(
        collect.paths(),
        vec![
            "LICENSE",
            "README.md",
            "ci.yml",
            "docs/index.md",
            "demo.txt",
            "raw.txt",
            "scripts/build.sh",
            "src/demo_lib/dune",
            "src/demo_lib/version.ml",
            "FILES",
        ]
    );

    let files = collect.get("FILES");
    assert_eq!(
        files.content,
        "LICENSE,README.md,demo.txt,raw.txt,scripts/build.sh,src/demo_lib/dune,src/demo_lib/version.ml\n"
    );
    assert!(!files.record);
}

#[test]
fn test_render_project_contents_and_flags() {
    let fixture = Fixture::new(demo_catalog);
    let collect = fixture.render(&demo_project()).unwrap();

    let readme = collect.get("README.md");
    assert_eq!(readme.content, "# demo\nSee docs.\n");
    assert!(readme.record && !readme.create_once && !readme.skip);

    let license = collect.get("LICENSE");
    assert_eq!(license.content, "Copyright ACME\n");
    assert!(license.create_once);
    assert!(!license.record);

    // subst = false: byte-for-byte copy, directives included.
    let raw = collect.get("raw.txt");
    assert_eq!(raw.content, "!{name} stays !(create)\n");
    assert!(!raw.create_once);

    assert_eq!(collect.get("demo.txt").content, "hello\n");

    let script = collect.get("scripts/build.sh");
    assert_eq!(script.content, "echo demo\n");
    assert_eq!(script.perm, 0o755);

    let docs = collect.get("docs/index.md");
    assert_eq!(docs.skip_tags, vec!["docs".to_string()]);
    assert!(docs.skip);

    let ci = collect.get("ci.yml");
    assert!(ci.skip);
    assert_eq!(ci.content, "");
}

#[test]
fn test_render_package_files() {
    let fixture = Fixture::new(demo_catalog);
    let collect = fixture.render(&demo_project()).unwrap();

    assert_eq!(collect.get("src/demo_lib/dune").content, "(library (name demo_lib))\n(wrapped true)\n");
    assert_eq!(collect.get("src/demo_lib/version.ml").content, "let owner = \"ACME\"\n");

    let mut project = demo_project();
    project.packages[0].pack_modules = false;
    project.fields.clear();
    project.fields.insert("owner".to_string(), "Nobody".to_string());
    let collect = fixture.render(&project).unwrap();
    assert_eq!(collect.get("src/demo_lib/dune").content, "(library (name demo_lib))\n");
    let version = collect.get("src/demo_lib/version.ml");
    assert!(version.skip);
}

#[test]
fn test_backup_mirrors_every_source() {
    let fixture = Fixture::new(demo_catalog);
    fixture.render(&demo_project()).unwrap();

    let backup = fixture.state.path().join("skeleton");
    assert_eq!(
        fs::read_to_string(backup.join("README.md")).unwrap(),
        "# !{name}\n!(if:skip:docs)\nSee docs.\n!(fi)\n!(if:gen:docs)\nDocs enabled.\n!(fi)\n"
    );
    // Skipped and package files are mirrored too.
    assert!(backup.join("ci.yml").is_file());
    assert!(backup.join("src/demo_lib/dune").is_file());
    // The source path, not the target path.
    assert!(backup.join("name.txt").is_file());
}

#[cfg(unix)]
#[test]
fn test_permissions_inherit_source_mode() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new(|root| {
        make_skeleton(
            root,
            "projects/program",
            "[skeleton]\nname = \"program\"\n[file.\"fixed\"]\nperm = 0o600\n",
            &[("tool", "x"), ("run.sh", "y"), ("fixed", "z")],
        );
        let dir = root.join("projects/program");
        fs::set_permissions(dir.join("tool"), fs::Permissions::from_mode(0o750)).unwrap();
        fs::set_permissions(dir.join("run.sh"), fs::Permissions::from_mode(0o644)).unwrap();
    });
    let collect = fixture.render(&Project { name: "p".to_string(), ..Project::default() }).unwrap();

    assert_eq!(collect.get("tool").perm, 0o750);
    assert_eq!(collect.get("run.sh").perm, 0o755);
    assert_eq!(collect.get("fixed").perm, 0o600);
}

#[test]
fn test_unresolved_reference_names_file() {
    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[("bad.txt", "!{nope}")]);
    });
    match fixture.render(&Project { name: "p".to_string(), ..Project::default() }) {
        Err(Error::FileError { file, source }) => {
            assert_eq!(file, "bad.txt");
            assert!(matches!(*source, Error::UnresolvedReference { .. }));
        }
        Err(other) => panic!("Expected FileError, got {other:?}"),
        Ok(_) => panic!("Expected FileError"),
    }
}

#[test]
fn test_conditional_errors_are_fatal() {
    let fixture = Fixture::new(|root| {
        make_skeleton(
            root,
            "projects/program",
            "[skeleton]\nname = \"program\"\n",
            &[("a.txt", "!(if:moon:full)\n"), ("b.txt", "!(elif:true)\n")],
        );
    });
    let err = fixture.render(&Project { name: "p".to_string(), ..Project::default() }).err().unwrap();
    assert_eq!(err.to_string(), "In file 'a.txt': Unknown condition 'moon:full'.");

    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[("b.txt", "!(elif:true)\n")]);
    });
    let err = fixture.render(&Project { name: "p".to_string(), ..Project::default() }).err().unwrap();
    assert_eq!(err.to_string(), "In file 'b.txt': elif without if.");
}

#[test]
fn test_packages_cannot_postpone() {
    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[]);
        make_skeleton(root, "packages/library", "[skeleton]\nname = \"library\"\n", &[("late.txt", "!{late.files}")]);
    });
    let project = Project {
        name: "p".to_string(),
        packages: vec![Package { name: "lib".to_string(), dir: "lib".to_string(), ..Package::default() }],
        ..Project::default()
    };
    assert!(matches!(
        fixture.render(&project),
        Err(Error::UnexpectedPostpone { file }) if file == "late.txt"
    ));
}

#[test]
fn test_missing_skeletons() {
    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[]);
    });
    let project = Project { name: "p".to_string(), skeleton: Some("web".to_string()), ..Project::default() };
    assert!(matches!(fixture.render(&project), Err(Error::MissingSkeleton { name, .. }) if name == "web"));

    let project = Project {
        name: "p".to_string(),
        packages: vec![Package { name: "lib".to_string(), dir: "lib".to_string(), ..Package::default() }],
        ..Project::default()
    };
    assert!(matches!(fixture.render(&project), Err(Error::MissingSkeleton { name, .. }) if name == "library"));
}

#[test]
fn test_contexts() {
    let project = demo_project();
    let context = project_context(&project, None).unwrap();
    assert_eq!(context["name"], "demo");
    assert_eq!(context["skeleton"], "program");
    assert_eq!(context["ci_systems"][0], "gitlab");
    assert!(context.get("late").is_none());

    let late = vec!["a".to_string()];
    let context = project_context(&project, Some(late.as_slice())).unwrap();
    assert_eq!(context["late"]["files"][0], "a");

    let context = package_context(&project, &project.packages[0]).unwrap();
    assert_eq!(context["name"], "demo_lib");
    assert_eq!(context["skeleton"], "library");
    assert_eq!(context["project"]["fields"]["owner"], "ACME");
}

#[test]
fn test_package_skip_list_applies_to_skip_tags() {
    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[]);
        make_skeleton(
            root,
            "packages/library",
            "[skeleton]\nname = \"library\"\n",
            &[
                ("test.ml", "!(skip:tests)\nlet () = ()\n"),
                ("lib.ml", "!(if:skip:tests)\n(* no tests *)\n!(fi)\n"),
            ],
        );
    });
    let mut project = Project {
        name: "p".to_string(),
        packages: vec![
            Package {
                name: "lib".to_string(),
                dir: "lib".to_string(),
                skip: vec!["tests".to_string()],
                ..Package::default()
            },
            Package { name: "other".to_string(), dir: "other".to_string(), ..Package::default() },
        ],
        ..Project::default()
    };

    let collect = fixture.render(&project).unwrap();
    assert!(collect.get("lib/test.ml").skip);
    assert_eq!(collect.get("lib/lib.ml").content, "(* no tests *)\n");
    assert!(!collect.get("other/test.ml").skip);
    assert_eq!(collect.get("other/lib.ml").content, "");

    // The project's list reaches every package.
    project.skip = vec!["tests".to_string()];
    let collect = fixture.render(&project).unwrap();
    assert!(collect.get("other/test.ml").skip);
}

#[test]
fn test_fs_writer_honours_package_skips() {
    let fixture = Fixture::new(|root| {
        make_skeleton(root, "projects/program", "[skeleton]\nname = \"program\"\n", &[]);
        make_skeleton(
            root,
            "packages/library",
            "[skeleton]\nname = \"library\"\n",
            &[("test.ml", "!(skip:tests)\nlet () = ()\n")],
        );
    });
    let project = Project {
        name: "p".to_string(),
        packages: vec![Package {
            name: "lib".to_string(),
            dir: "lib".to_string(),
            skip: vec!["tests".to_string()],
            ..Package::default()
        }],
        ..Project::default()
    };
    let output = TempDir::new().unwrap();
    let mut cache = SkeletonCache::new(vec![SkeletonSource::builtin(fixture.catalogs.path())]);
    let substitutor = MiniJinjaSubstitutor::new();
    let backup = BackupStore::new(fixture.state.path());
    let mut writer = FsWriter::new(output.path(), project.skip.clone());
    Processor::new(&substitutor, &backup).render_project(&project, &mut cache, &mut writer).unwrap();

    assert_eq!(writer.actions(), &[(WriteAction::Skipped, PathBuf::from("lib/test.ml"))]);
    assert!(!output.path().join("lib/test.ml").exists());
}

#[test]
fn test_targets_stay_inside_output() {
    for target in ["/etc/passwd", "../outside", "docs/../../outside", "!{ name }/../../x"] {
        let descriptor = format!("[skeleton]\nname = \"program\"\n[file.\"a.txt\"]\nfile = \"{target}\"\n");
        let fixture = Fixture::new(|root| {
            make_skeleton(root, "projects/program", &descriptor, &[("a.txt", "x")]);
        });
        match fixture.render(&Project { name: "p".to_string(), ..Project::default() }) {
            Err(Error::FileError { file, source }) => {
                assert_eq!(file, "a.txt");
                assert!(matches!(*source, Error::InvalidTarget { .. }), "{target}: {source:?}");
            }
            Err(other) => panic!("{target}: expected FileError, got {other:?}"),
            Ok(_) => panic!("{target}: expected FileError"),
        }
    }

    let fixture = Fixture::new(|root| {
        make_skeleton(
            root,
            "projects/program",
            "[skeleton]\nname = \"program\"\n[file.\"a.txt\"]\nfile = \"./docs/!{ name }.txt\"\n",
            &[("a.txt", "x")],
        );
    });
    let collect = fixture.render(&Project { name: "p".to_string(), ..Project::default() }).unwrap();
    assert_eq!(collect.paths(), vec!["./docs/p.txt"]);
}
