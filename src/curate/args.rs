use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "curate", version)]
#[command(about = "Batch maintenance runner for curated catalog entities", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the catalog file
    #[arg(short, long, global = true, default_value = "catalog.json")]
    pub registry: PathBuf,

    /// Worker pool size for batch processing
    #[arg(short, long, global = true, default_value_t = 4)]
    pub threads: usize,

    /// Process targets even when the event history says there is nothing
    /// to do, and skip confirmation prompts
    #[arg(short, long, global = true)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List catalog entities
    #[command(alias = "ls")]
    List,

    /// Validate entities and record a sweep event for each
    Sweep {
        /// Entity identifiers (short names or ids); use --all instead to
        /// sweep everything
        #[arg(num_args = 0..)]
        identifiers: Vec<String>,

        /// Sweep every entity in the catalog
        #[arg(long, conflicts_with = "identifiers")]
        all: bool,

        /// Only sweep entities of this taxon
        #[arg(long, conflicts_with_all = ["identifiers", "all"])]
        taxon: Option<String>,
    },

    /// Permanently remove entities from the catalog
    #[command(alias = "rm")]
    Purge {
        /// Entity identifiers (short names or ids)
        #[arg(num_args = 0..)]
        identifiers: Vec<String>,

        /// Purge every entity in the catalog
        #[arg(long, conflicts_with = "identifiers")]
        all: bool,

        /// Answer YES to the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
