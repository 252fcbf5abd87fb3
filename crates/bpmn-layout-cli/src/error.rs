use std::io;

use thiserror::Error;

use bpmn_layout::LayoutError;

use crate::config::ConfigError;

/// Failures of one CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid definitions JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
