use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "export-renamer")]
#[command(about = "Renames exported documents after the person they belong to", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Configuration file name, without extension
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Show what would be renamed without touching any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Number of files processed in parallel
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Never convert renamed files
    #[arg(long, global = true)]
    pub no_convert: bool,

    /// Print the batch summary as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rename a single file
    File { path: PathBuf },
    /// Rename a list of files; reads one path per line from stdin when none are given
    Files { paths: Vec<PathBuf> },
    /// Rename every regular file directly inside a directory
    Dir { path: PathBuf },
    /// Show how file names are parsed, without any lookup or rename
    Inspect {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Verify the identity database is reachable
    CheckDb,
    /// Print configuration values
    PrintConfig,
}
