//! Command-line argument definitions for the layout CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input/output paths, configuration file
//! selection, per-run layout options and logging verbosity.

use clap::Parser;

/// Command-line arguments for the BPMN layout tool
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input definitions file (JSON)
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Path to the laid out definitions file (JSON)
    #[arg(short, long, default_value = "out.json")]
    pub output: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable or disable pool and lane auto-expansion
    #[arg(long)]
    pub pool_expansion: Option<bool>,

    /// Round all coordinates to this pixel grid
    #[arg(long)]
    pub grid_snap: Option<f32>,

    /// Write the layout result summary (JSON) to this path
    #[arg(long)]
    pub report: Option<String>,
}

impl Args {
    /// Arguments for laying out `input` into `output` with default options.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config: None,
            log_level: "off".to_string(),
            pool_expansion: None,
            grid_snap: None,
            report: None,
        }
    }
}
