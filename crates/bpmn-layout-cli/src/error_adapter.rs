//! Error adapter for converting [`CliError`] to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI. Layout errors carry
//! no source spans, so every error renders as a code, a message and, where a
//! fix is obvious, a help line.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use bpmn_layout::{GraphBuildError, LayoutError, LayoutSolverError};

use crate::{config::ConfigError, error::CliError};

/// Adapter implementing [`MietteDiagnostic`] for a [`CliError`].
pub struct ErrorAdapter<'a>(pub &'a CliError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.0 {
            CliError::Io(_) => "bpmn_layout::io",
            CliError::Json(_) => "bpmn_layout::input",
            CliError::Config(_) => "bpmn_layout::config",
            CliError::Layout(LayoutError::GraphBuild(_)) => "bpmn_layout::graph",
            CliError::Layout(LayoutError::Solver(_)) => "bpmn_layout::solver",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.0 {
            CliError::Json(_) => "The input must be an object with an `elements` array",
            CliError::Config(ConfigError::MissingFile(_)) => {
                "Check the --config path or omit it to use the default search order"
            }
            CliError::Config(ConfigError::Parse(_)) => "Check the TOML syntax of the configuration file",
            CliError::Layout(LayoutError::GraphBuild(GraphBuildError::DanglingReference { .. })) => {
                "Every source, target and parent must name an element in the input"
            }
            CliError::Layout(LayoutError::GraphBuild(GraphBuildError::MissingHost { .. })) => {
                "Boundary events must be attached to an activity in the input"
            }
            CliError::Layout(LayoutError::GraphBuild(GraphBuildError::DuplicateId(_))) => {
                "Element ids must be unique"
            }
            CliError::Layout(LayoutError::Solver(LayoutSolverError::DegenerateNode(_))) => {
                "Remove zero-sized bounds from the input or omit them"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

/// Wraps an error for rendering with a miette report handler.
pub fn to_reportable(err: &CliError) -> ErrorAdapter<'_> {
    ErrorAdapter(err)
}
