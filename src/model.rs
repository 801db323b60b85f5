//! Read-only description of the project being rendered.
//! The project file is a TOML document deserialised straight into [`Project`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::constants::{DEFAULT_EDITION, DEFAULT_PROJECT_SKELETON, PACKAGE_MANIFEST, PROJECT_MANIFEST};
use crate::error::{Error, Result};

/// The two families of skeletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Project,
    Package,
}

impl Kind {
    /// Manifest fragment read next to `skeleton.toml`.
    pub fn manifest_file(self) -> &'static str {
        match self {
            Kind::Project => PROJECT_MANIFEST,
            Kind::Package => PACKAGE_MANIFEST,
        }
    }

    /// Subdirectory of a catalog root holding skeletons of this kind.
    pub fn subdir(self) -> &'static str {
        match self {
            Kind::Project => "projects",
            Kind::Package => "packages",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Project => write!(f, "project"),
            Kind::Package => write!(f, "package"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    #[default]
    Library,
    Program,
    Virtual,
}

impl PackageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageKind::Library => "library",
            PackageKind::Program => "program",
            PackageKind::Virtual => "virtual",
        }
    }
}

fn default_edition() -> String {
    DEFAULT_EDITION.to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub skeleton: Option<String>,
    /// Tags of generated content the user opted out of.
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub ci_systems: Vec<String>,
    #[serde(default)]
    pub github_organization: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub bug_reports: Option<String>,
    #[serde(default)]
    pub dev_repo: Option<String>,
    #[serde(default)]
    pub doc_gen: Option<String>,
    #[serde(default)]
    pub doc_api: Option<String>,
    #[serde(default)]
    pub sphinx_target: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_edition")]
    pub edition: String,
    #[serde(default)]
    pub min_edition: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    #[serde(default)]
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Package {
    pub name: String,
    /// Directory of the package, relative to the project root.
    pub dir: String,
    #[serde(default)]
    pub kind: PackageKind,
    #[serde(default)]
    pub skeleton: Option<String>,
    #[serde(default)]
    pub pack_modules: bool,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

impl Project {
    /// Reads a project description from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::ManifestError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn skeleton_name(&self) -> &str {
        self.skeleton.as_deref().unwrap_or(DEFAULT_PROJECT_SKELETON)
    }

    pub fn skips(&self, tag: &str) -> bool {
        self.skip.iter().any(|s| s == tag)
    }
}

impl Package {
    pub fn skeleton_name(&self) -> &str {
        self.skeleton.as_deref().unwrap_or(self.kind.as_str())
    }
}
