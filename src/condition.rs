//! Predicates used by `if:`/`elif:` directives.
//!
//! A condition is a `:`-separated token string such as `skip:docs`,
//! `ci:ubuntu-latest` or `not:field:license:MIT`. Projects and packages
//! understand slightly different vocabularies; a package hands anything it
//! does not know (and everything behind a `project:` prefix) to its project.

use crate::error::{Error, Result};
use crate::model::{Package, Project};

/// Something a condition can be evaluated against.
pub trait Condition {
    fn eval_condition(&self, condition: &str) -> Result<bool>;

    /// Whether `tag` is opted out of for this subject.
    fn skips(&self, tag: &str) -> bool;
}

impl Condition for Project {
    fn eval_condition(&self, condition: &str) -> Result<bool> {
        let tokens: Vec<&str> = condition.split(':').collect();
        eval_project(self, &tokens, condition)
    }

    fn skips(&self, tag: &str) -> bool {
        Project::skips(self, tag)
    }
}

/// A package seen together with the project that owns it.
#[derive(Debug, Clone, Copy)]
pub struct PackageSubject<'a> {
    pub project: &'a Project,
    pub package: &'a Package,
}

impl<'a> PackageSubject<'a> {
    pub fn new(project: &'a Project, package: &'a Package) -> Self {
        Self { project, package }
    }
}

impl Condition for PackageSubject<'_> {
    fn eval_condition(&self, condition: &str) -> Result<bool> {
        let tokens: Vec<&str> = condition.split(':').collect();
        eval_package(self, &tokens, condition)
    }

    /// The package's own skip list and the project's both count.
    fn skips(&self, tag: &str) -> bool {
        self.package.skip.iter().any(|s| s == tag) || self.project.skips(tag)
    }
}

fn eval_project(p: &Project, tokens: &[&str], original: &str) -> Result<bool> {
    let result = match tokens {
        ["skeleton", "is", name] => p.skeleton_name() == *name,
        ["skip", tag] => p.skips(tag),
        ["gen", tag] => !p.skips(tag),
        ["not", rest @ ..] => !eval_project(p, rest, original)?,
        ["true"] => true,
        ["false"] => false,
        ["ci", system] => p.ci_systems.iter().any(|s| s == *system),
        ["github-organization"] => p.github_organization.is_some(),
        ["homepage"] => p.homepage.is_some(),
        ["copyright"] => p.copyright.is_some(),
        ["bug-reports"] => p.bug_reports.is_some(),
        ["dev-repo"] => p.dev_repo.is_some(),
        ["doc-gen"] => p.doc_gen.is_some(),
        ["doc-api"] => p.doc_api.is_some(),
        ["sphinx-target"] => p.sphinx_target.is_some(),
        ["profile"] => p.profile.is_some(),
        ["min-edition"] => p.min_edition.as_deref().is_some_and(|m| m != p.edition),
        ["field", name] => p.fields.contains_key(*name),
        ["field", name, value @ ..] => {
            p.fields.get(*name).is_some_and(|v| *v == value.join(":"))
        }
        _ => return Err(Error::UnknownCondition(original.to_string())),
    };
    Ok(result)
}

fn eval_package(s: &PackageSubject<'_>, tokens: &[&str], original: &str) -> Result<bool> {
    let pkg = s.package;
    let result = match tokens {
        ["skeleton", "is", name] => pkg.skeleton_name() == *name,
        ["kind", "is", kind] => pkg.kind.as_str() == *kind,
        ["pack"] => pkg.pack_modules,
        ["skip", tag] => s.skips(tag),
        ["gen", tag] => !s.skips(tag),
        ["not", rest @ ..] => !eval_package(s, rest, original)?,
        ["true"] => true,
        ["false"] => false,
        ["field", name] => pkg.fields.contains_key(*name),
        ["field", name, value @ ..] => {
            pkg.fields.get(*name).is_some_and(|v| *v == value.join(":"))
        }
        ["project", rest @ ..] => eval_project(s.project, rest, original)?,
        // CI systems and project metadata live on the project.
        _ => eval_project(s.project, tokens, original)?,
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_without_operand_is_unknown() {
        let project = Project::default();
        match project.eval_condition("not") {
            Err(Error::UnknownCondition(text)) => assert_eq!(text, "not"),
            other => panic!("Expected UnknownCondition, got {other:?}"),
        }
    }

    #[test]
    fn test_field_value_keeps_colons() {
        let mut project = Project::default();
        project.fields.insert("url".to_string(), "https://example.org".to_string());
        assert!(project.eval_condition("field:url:https://example.org").unwrap());
        assert!(!project.eval_condition("field:url:https").unwrap());
    }
}
