//! Error handling for skel.
//! Defines the error type and result alias used throughout the crate.

use std::io;
use thiserror::Error;

use crate::model::Kind;

/// Errors raised while loading, resolving or rendering skeletons.
///
/// Loader failures are caught by the catalog builder and turned into warnings;
/// everything else propagates up and aborts the render.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// A TOML manifest could not be parsed.
    #[error("Cannot parse manifest '{path}': {message}.")]
    ManifestError { path: String, message: String },

    /// `skeleton.toml` lacks the required `skeleton.name` string.
    #[error("Missing 'skeleton.name' in '{path}'.")]
    MissingNameError { path: String },

    #[error("Missing {kind} skeleton '{name}'.")]
    MissingSkeleton { kind: Kind, name: String },

    #[error("Inheritance cycle through {kind} skeleton '{name}'.")]
    InheritanceCycle { kind: Kind, name: String },

    /// A conditional directive used a form nobody understands.
    #[error("Unknown condition '{0}'.")]
    UnknownCondition(String),

    /// `else`, `elif` or `fi` found with nothing on the conditional stack.
    #[error("{directive} without if.")]
    UnbalancedConditional { directive: &'static str },

    /// A `!{...}` reference could not be resolved against the context.
    #[error("Unresolved reference '{reference}'.")]
    UnresolvedReference { reference: String },

    /// Raised by the substitution engine when a reference depends on data
    /// only available in the second pass.
    #[error("Substitution postponed.")]
    Postpone,

    /// A postponement request where no later pass remains.
    #[error("File '{file}' cannot be postponed any further.")]
    UnexpectedPostpone { file: String },

    /// A target path that is empty, absolute or climbs out with `..`.
    #[error("Target path '{target}' is outside the output directory.")]
    InvalidTarget { target: String },

    /// Wraps any rendering failure with the name of the skeleton file.
    #[error("In file '{file}': {source}")]
    FileError {
        file: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Git error: {0}.")]
    Git2Error(#[from] git2::Error),

    #[error("JSON error: {0}.")]
    JsonError(#[from] serde_json::Error),

    #[error("Template error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    #[error("Walk error: {0}.")]
    WalkDirError(#[from] walkdir::Error),

    /// Represents errors in processing .skelignore files
    #[error("Ignore error: {0}.")]
    IgnoreError(String),

    /// Represents errors that occur during configuration parsing or processing
    #[error("Configuration error: {0}.")]
    ConfigError(String),
}

/// Convenience type alias for Results with skel's Error as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: anyhow::Error) {
    eprintln!("{err:#}");
    std::process::exit(1);
}
