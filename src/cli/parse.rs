//! CLI parse: clap types for assimilate. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Assimilate CLI - cycle data preparation for data assimilation
#[derive(Parser)]
#[command(name = "assimilate")]
#[command(about = "Window reconciliation, solver configuration rendering and observation merging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the assimilation window of a cycle
    Window {
        /// Cycle time (2021-12-12T00:00:00Z or 20211212T000000Z)
        cycle: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the observation slots covering a cycle's window
    Slots {
        /// Cycle time
        cycle: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Render a template with a cycle's context
    Render {
        /// Cycle time
        cycle: String,
        /// Executable template name (default: the configured application's template)
        #[arg(long, conflicts_with = "observation")]
        template: Option<String>,
        /// Render the template of this observation type instead
        #[arg(long)]
        observation: Option<String>,
        /// Write the document here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge dataset files along their growing dimension
    Merge {
        /// Output file
        #[arg(long)]
        output: PathBuf,
        /// Growing dimension (default: observations.growing_dimension)
        #[arg(long)]
        dimension: Option<String>,
        /// Fixed dimensions every input must have (comma separated; default: derived)
        #[arg(long, value_delimiter = ',')]
        fixed: Vec<String>,
        /// Input files; missing ones are skipped
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Summarize a dataset file
    Inspect {
        /// Dataset file
        path: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run one assimilation cycle
    Run {
        /// Cycle time
        cycle: String,
        /// Render configuration files without dispatching the solver
        #[arg(long)]
        generate_config_only: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
