//! Per-file write policy.
//!
//! Flags come from two places: the `[file."<path>"]` tables of a skeleton
//! manifest, and `!(...)` directives embedded in the template text itself.
//! Directives are consumed by [`FlagParser`], which also owns the handling of
//! the `if`/`elif`/`else`/`fi` conditional stack.

use log::warn;
use std::collections::{BTreeMap, BTreeSet};

use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::renderer::Brackets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFlags {
    /// Output path, may contain `!{...}` references. Empty means the source path.
    pub target: String,
    /// Never overwrite an existing output file.
    pub create_once: bool,
    /// Register the written file with version control.
    pub record: bool,
    /// The file is dropped when any of these tags is skipped by the project.
    pub skip_tags: BTreeSet<String>,
    pub force_skip: bool,
    /// One frame per open `if`; `true` means the frame suppresses output.
    pub skip_stack: Vec<bool>,
    pub subst: bool,
    /// Mode bits; `0` means inherit from the source file. Strings and
    /// directives are read as octal, TOML integers as written.
    pub perm: u32,
}

impl Default for FileFlags {
    fn default() -> Self {
        Self {
            target: String::new(),
            create_once: false,
            record: true,
            skip_tags: BTreeSet::new(),
            force_skip: false,
            skip_stack: Vec::new(),
            subst: true,
            perm: 0,
        }
    }
}

impl FileFlags {
    /// True when any open conditional frame suppresses output.
    pub fn suppressed(&self) -> bool {
        self.skip_stack.iter().any(|frame| *frame)
    }

    /// Whether the pipeline itself asks the writer to skip this file.
    pub fn skip(&self) -> bool {
        self.force_skip || self.suppressed()
    }

    /// Resolves the final mode: inherit `source_mode` when unset, and always
    /// make shell scripts executable.
    pub fn finalize_perm(&mut self, path: &str, source_mode: u32) {
        if self.perm == 0 {
            self.perm = source_mode;
        }
        if path.ends_with(".sh") {
            self.perm |= 0o111;
        }
    }

    /// Builds flags from one `[file."<path>"]` manifest table.
    pub fn from_table(path: &str, table: &toml::Table) -> Self {
        let mut flags = FileFlags::default();
        for (key, value) in table {
            match (key.as_str(), value) {
                ("file", toml::Value::String(target)) => flags.target = target.clone(),
                ("create", toml::Value::Boolean(b)) => flags.create_once = *b,
                ("record", toml::Value::Boolean(b)) => flags.record = *b,
                ("skip", toml::Value::Boolean(b)) => flags.force_skip = *b,
                ("subst", toml::Value::Boolean(b)) => flags.subst = *b,
                ("skips", toml::Value::Array(tags)) => {
                    for tag in tags {
                        match tag.as_str() {
                            Some(tag) => {
                                flags.skip_tags.insert(tag.to_string());
                            }
                            None => warn!("file '{path}': ignoring non-string skip tag {tag}"),
                        }
                    }
                }
                // Integers keep their TOML value: write `0o755` or `"755"`.
                ("perm", toml::Value::Integer(mode)) => match u32::try_from(*mode) {
                    Ok(mode) => {
                        if mode > 0o777 {
                            warn!(
                                "file '{path}': perm {mode} is decimal (0o{mode:o}), \
                                 write 0o{mode} or \"{mode}\" for octal"
                            );
                        }
                        flags.perm = mode;
                    }
                    Err(_) => warn!("file '{path}': invalid perm {mode}"),
                },
                ("perm", toml::Value::String(digits)) => match parse_octal(digits) {
                    Some(mode) => flags.perm = mode,
                    None => warn!("file '{path}': invalid perm '{digits}'"),
                },
                _ => warn!("file '{path}': discarding unknown flag {key} = {value}"),
            }
        }
        flags
    }
}

/// Parses the `[file]` table of a skeleton manifest. Entries that are not
/// tables are reported and dropped.
pub fn parse_file_table(table: &toml::Table) -> BTreeMap<String, FileFlags> {
    let mut result = BTreeMap::new();
    for (path, value) in table {
        match value {
            toml::Value::Table(flags) => {
                result.insert(path.clone(), FileFlags::from_table(path, flags));
            }
            _ => warn!("[file] entry '{path}' is not a table, ignored"),
        }
    }
    result
}

fn parse_octal(digits: &str) -> Option<u32> {
    u32::from_str_radix(digits, 8).ok()
}

/// Applies embedded directives to the flags of one file.
///
/// Lives for exactly one substitution pass over one file.
pub struct FlagParser<'a> {
    flags: &'a mut FileFlags,
    subject: &'a dyn Condition,
}

impl<'a> FlagParser<'a> {
    pub fn new(flags: &'a mut FileFlags, subject: &'a dyn Condition) -> Self {
        Self { flags, subject }
    }

    fn top(&mut self, directive: &'static str) -> Result<&mut bool> {
        self.flags
            .skip_stack
            .last_mut()
            .ok_or(Error::UnbalancedConditional { directive })
    }

    /// Handles `if`/`elif`/`else`/`fi`. Returns `false` for any other directive.
    fn conditional(&mut self, head: &str, arg: Option<&str>) -> Result<bool> {
        match (head, arg) {
            ("if", Some(cond)) => {
                let value = self.subject.eval_condition(cond)?;
                self.flags.skip_stack.push(!value);
            }
            ("elif", Some(cond)) => {
                self.top("elif")?;
                let value = self.subject.eval_condition(cond)?;
                *self.top("elif")? = !value;
            }
            ("else", None) => {
                let frame = self.top("else")?;
                *frame = !*frame;
            }
            ("fi" | "endif", None) => {
                self.flags
                    .skip_stack
                    .pop()
                    .ok_or(Error::UnbalancedConditional { directive: "fi" })?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Brackets for FlagParser<'_> {
    fn directive(&mut self, text: &str) -> Result<String> {
        let (head, arg) = match text.split_once(':') {
            Some((head, arg)) => (head, Some(arg)),
            None => (text, None),
        };

        if self.conditional(head, arg)? || self.flags.suppressed() {
            return Ok(String::new());
        }

        match (head, arg) {
            ("file", Some(path)) => self.flags.target = path.to_string(),
            ("create", None) => self.flags.create_once = true,
            ("skip", Some(tag)) => {
                self.flags.skip_tags.insert(tag.to_string());
            }
            ("skip", None) => self.flags.force_skip = true,
            ("no-record", None) => self.flags.record = false,
            ("perm", Some(digits)) => match parse_octal(digits) {
                Some(mode) => self.flags.perm = mode,
                None => warn!("Invalid permission in directive '{text}'"),
            },
            _ => warn!("Unknown directive '{text}'"),
        }
        Ok(String::new())
    }

    fn suppressed(&self) -> bool {
        self.flags.suppressed()
    }
}
