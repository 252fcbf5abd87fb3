//! CLI logic for the BPMN layout tool.
//!
//! Reads definitions from a JSON file, lays them out and writes the
//! definitions back with DI geometry filled in.

pub mod error_adapter;

mod args;
mod config;
mod error;

pub use args::Args;
pub use config::{AppConfig, ConfigError, load_config};
pub use error::CliError;

use std::fs;

use log::info;

use bpmn_layout::{LayoutEngine, LayoutResult, config::LayoutOptions, model::Definitions};

/// Run the layout CLI application
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed input JSON
/// - Graph build and solver errors
pub fn run(args: &Args) -> Result<LayoutResult, CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing definitions"
    );

    let app_config = config::load_config(args.config.as_ref())?;
    let options = merge_options(app_config.options, args);

    let source = fs::read_to_string(&args.input)?;
    let mut definitions = Definitions::from_json(&source)?;

    let engine = LayoutEngine::new(app_config.layout);
    let result = engine.layout(&mut definitions, &options)?;

    fs::write(&args.output, definitions.to_json()?)?;
    info!(output_file = args.output; "Definitions written");

    if let Some(report) = &args.report {
        fs::write(report, serde_json::to_string_pretty(&result)?)?;
        info!(report_file = report.as_str(); "Layout report written");
    }

    Ok(result)
}

/// Applies command-line flags over the options from the configuration file.
fn merge_options(mut options: LayoutOptions, args: &Args) -> LayoutOptions {
    if let Some(enabled) = args.pool_expansion {
        options = options.with_pool_expansion(enabled);
    }
    if let Some(grid) = args.grid_snap {
        options = options.with_grid_snap(grid);
    }
    options
}
