//! Command-line interface implementation for skel.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::Kind;

/// Command-line arguments structure for skel.
#[derive(Parser, Debug)]
#[command(author, version, about = "skel: render projects from skeletons", long_about = None)]
pub struct Args {
    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Additional catalog root (containing projects/ and packages/).
    /// May be repeated; later roots override earlier ones.
    #[arg(short, long = "skeletons", value_name = "DIR", global = true)]
    pub skeletons: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a project and its packages from their skeletons
    Render {
        /// Project description file (defaults to drom.toml in the output directory)
        #[arg(short, long, value_name = "FILE")]
        project: Option<PathBuf>,

        /// Project root where files are written
        #[arg(short, long, value_name = "OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },
    /// List the skeletons available in the catalogs
    List {
        #[arg(short, long, value_enum)]
        kind: Option<Kind>,
    },
    /// Show a resolved skeleton: its files, declared flags and manifest
    Show {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(short, long, value_enum, default_value = "project")]
        kind: Kind,
    },
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument
                || e.kind() == ErrorKind::MissingSubcommand
            {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
