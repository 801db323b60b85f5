//! Text substitution for skeleton files.
//!
//! Templates use two kinds of markers:
//! - `!{expr}` is replaced by the value of a MiniJinja expression evaluated
//!   against the render context, e.g. `!{name | kebab_case}`;
//! - `!(directive)` is handed to a [`Brackets`] handler, which configures the
//!   file being rendered and returns the text to emit in its place.
//!
//! A line containing nothing but a directive is removed together with its
//! newline. While the handler reports suppression (inside a false `if`
//! block), text and references are dropped but directives are still fed to it.
//!
//! Only the heads in [`DIRECTIVE_HEADS`] open a directive; any other `!(`
//! is plain text. `\!(` and `\!{` emit a literal `!(` or `!{`.
use cruet::Inflector;
use log::warn;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Root variable only present in the context of the final project pass.
pub const LATE_VARIABLE: &str = "late";

/// Words that may start a `!(...)` directive. A head is followed by `)` or by
/// `:` and an argument running up to the closing parenthesis.
pub const DIRECTIVE_HEADS: [&str; 10] =
    ["if", "elif", "else", "fi", "endif", "file", "create", "skip", "no-record", "perm"];

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"\\!(?P<escaped>[({{])|!\{{(?P<expr>[^}}]*)\}}|!\((?P<directive>(?:{})(?::[^)\n]*)?)\)",
        DIRECTIVE_HEADS.join("|")
    );
    Regex::new(&pattern).expect("valid regex")
});

/// Receiver of the `!(...)` directives found while substituting.
pub trait Brackets {
    /// Processes one directive and returns its replacement text.
    fn directive(&mut self, text: &str) -> Result<String>;

    /// Whether output is currently being suppressed.
    fn suppressed(&self) -> bool;
}

/// Brackets handler for contexts where directives make no sense (target
/// paths): every directive is reported and elided.
pub struct NoBrackets;

impl Brackets for NoBrackets {
    fn directive(&mut self, text: &str) -> Result<String> {
        warn!("Directive '{text}' ignored here");
        Ok(String::new())
    }

    fn suppressed(&self) -> bool {
        false
    }
}

/// Trait for substitution engines.
pub trait Substitutor {
    /// Renders `template` with the given context.
    ///
    /// # Errors
    /// * `Error::Postpone` if a reference needs data from the final pass
    /// * `Error::UnresolvedReference` if a reference cannot be resolved
    /// * whatever the brackets handler returns
    fn substitute(
        &self,
        template: &str,
        context: &serde_json::Value,
        brackets: &mut dyn Brackets,
    ) -> Result<String>;
}

/// MiniJinja-based substitution engine.
pub struct MiniJinjaSubstitutor {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaSubstitutor {
    /// Creates a new substitutor with strict undefined handling and the case
    /// conversion filters registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("snake_case", |value: String| value.to_snake_case());
        env.add_filter("kebab_case", |value: String| value.to_kebab_case());
        env.add_filter("camel_case", |value: String| value.to_camel_case());
        env.add_filter("pascal_case", |value: String| value.to_pascal_case());
        env.add_filter("title_case", |value: String| value.to_title_case());
        env.add_filter("screaming_snake_case", |value: String| {
            value.to_screaming_snake_case()
        });
        Self { env }
    }

    fn eval(&self, expr: &str, context: &serde_json::Value) -> Result<String> {
        let expr = expr.trim();
        if is_late(expr) && context.get(LATE_VARIABLE).is_none() {
            return Err(Error::Postpone);
        }

        let unresolved = || Error::UnresolvedReference { reference: expr.to_string() };
        let value = self
            .env
            .compile_expression(expr)?
            .eval(context)
            .map_err(|e| match e.kind() {
                ErrorKind::UndefinedError => unresolved(),
                _ => Error::MinijinjaError(e),
            })?;
        // Unset optional attributes serialise as `none`.
        if value.is_undefined() || value.is_none() {
            return Err(unresolved());
        }
        Ok(value.to_string())
    }

    fn substitute_line(
        &self,
        line: &str,
        context: &serde_json::Value,
        brackets: &mut dyn Brackets,
        out: &mut String,
    ) -> Result<()> {
        let trimmed = line.trim();
        if let Some(caps) = TOKEN_REGEX.captures(trimmed) {
            if let (Some(whole), Some(directive)) = (caps.get(0), caps.name("directive")) {
                if whole.start() == 0 && whole.end() == trimmed.len() {
                    brackets.directive(directive.as_str())?;
                    return Ok(());
                }
            }
        }

        let mut last = 0;
        for caps in TOKEN_REGEX.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            if !brackets.suppressed() {
                out.push_str(&line[last..whole.start()]);
            }
            if let Some(bracket) = caps.name("escaped") {
                if !brackets.suppressed() {
                    out.push('!');
                    out.push_str(bracket.as_str());
                }
            } else if let Some(expr) = caps.name("expr") {
                if !brackets.suppressed() {
                    out.push_str(&self.eval(expr.as_str(), context)?);
                }
            } else if let Some(directive) = caps.name("directive") {
                let replacement = brackets.directive(directive.as_str())?;
                if !brackets.suppressed() {
                    out.push_str(&replacement);
                }
            }
            last = whole.end();
        }
        if !brackets.suppressed() {
            out.push_str(&line[last..]);
        }
        Ok(())
    }
}

impl Default for MiniJinjaSubstitutor {
    fn default() -> Self {
        MiniJinjaSubstitutor::new()
    }
}

impl Substitutor for MiniJinjaSubstitutor {
    fn substitute(
        &self,
        template: &str,
        context: &serde_json::Value,
        brackets: &mut dyn Brackets,
    ) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        for line in template.split_inclusive('\n') {
            self.substitute_line(line, context, brackets, &mut out)?;
        }
        Ok(out)
    }
}

fn is_late(expr: &str) -> bool {
    expr.split(|c: char| !(c.is_alphanumeric() || c == '_')).next() == Some(LATE_VARIABLE)
}
