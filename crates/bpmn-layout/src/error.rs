//! Error types for layout operations.
//!
//! Only two failure classes are fatal: a graph that cannot be built
//! ([`GraphBuildError`]) and a layered solver failure ([`LayoutSolverError`]).
//! Everything else (label placement exhausted, lane ownership conflicts,
//! exception chains that cannot fully avoid overlap) degrades gracefully and
//! is reported through diagnostic counts on the layout result.

use thiserror::Error;

/// The main error type for a layout invocation.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Graph error: {0}")]
    GraphBuild(#[from] GraphBuildError),

    #[error("Layout solver error: {0}")]
    Solver(#[from] LayoutSolverError),
}

/// Failures while flattening the element tree into a layout graph.
///
/// Raised before the solver is invoked; no positions are written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphBuildError {
    #[error("{element} references missing element `{reference}`")]
    DanglingReference { element: String, reference: String },

    #[error("Boundary event {event} is attached to missing host `{host}`")]
    MissingHost { event: String, host: String },

    #[error("Element id `{0}` is declared more than once")]
    DuplicateId(String),

    #[error("Containment cycle through `{0}`")]
    ContainmentCycle(String),
}

/// Failures of the external layered-layout solver.
///
/// No partial positions are applied when this is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutSolverError {
    #[error("Node {0} has a zero or negative size")]
    DegenerateNode(String),

    #[error("Solver panicked: {0}")]
    Panicked(String),

    #[error("Solver returned no position for node {0}")]
    MissingPosition(String),

    #[error("Solver returned an empty layout for {0} nodes")]
    EmptyResult(usize),
}
