//! skel renders projects from skeletons.
//! A skeleton is a directory of template files plus a manifest; skeletons can
//! inherit from one another and their files carry per-file write policies.

/// Command-line interface module for the skel binary
pub mod cli;

/// Conditions evaluated by `if:`/`elif:` directives
pub mod condition;

/// Catalog roots and project locations
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// Per-file flags and the directive parser
pub mod flags;

/// File ignore patterns
/// Processes .skelignore files to keep paths out of a skeleton
pub mod ignore;

/// Skeleton loading and the catalog cache
pub mod loader;

pub mod logger;

/// Project and package descriptions
pub mod model;

/// Core render orchestration
pub mod processor;

/// Text substitution engines
pub mod renderer;

/// Skeletons and inheritance
pub mod skeleton;

/// Write decisions and the source backup store
pub mod writer;
