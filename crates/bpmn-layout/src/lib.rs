//! Automatic layout for BPMN process diagrams.
//!
//! Given a snapshot of a BPMN element tree, the engine computes bounds for
//! every shape, orthogonal waypoints for every connection and positions for
//! external labels, then writes them back to the model. The pipeline:
//!
//! 1. [`graph::builder`] flattens the element tree into a [`graph::LayoutGraph`];
//! 2. [`classify`] marks the on-path edge of every split;
//! 3. [`placement`] hands each scope to a [`placement::LayeredSolver`];
//! 4. [`rows`] keeps on-path chains on one row and stacks off-path branches;
//! 5. [`containers`] sizes pools and lanes;
//! 6. [`boundary`] moves exception chains below their hosts;
//! 7. [`routing`] computes waypoints and clamps intra-lane flows;
//! 8. [`crossings`] counts crossing flow pairs;
//! 9. [`labels`] declutters external labels.

pub mod artifacts;
pub mod boundary;
pub mod classify;
pub mod config;
pub mod containers;
pub mod crossings;
pub mod diagnostics;
pub mod graph;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod placement;
pub mod routing;
pub mod rows;

mod error;

pub use bpmn_layout_core::{geometry, identifier};

pub use error::{GraphBuildError, LayoutError, LayoutSolverError};
pub use graph::builder::build as build_graph;
pub use pipeline::LayoutResult;

use log::info;

use config::{LayoutConfig, LayoutOptions};
use model::DiagramModel;
use placement::{LayeredSolver, SugiyamaSolver};

/// Lays out diagrams with a fixed configuration and solver.
///
/// The engine holds no per-diagram state; every call to
/// [`layout`](Self::layout) builds its graph and step log from scratch. Calls
/// on the same model must not overlap.
///
/// # Examples
///
/// ```rust
/// use bpmn_layout::{LayoutEngine, config::LayoutOptions, model::{Definitions, ElementRecord}};
///
/// let mut definitions = Definitions::new();
/// definitions
///     .add(ElementRecord::shape("Start", "bpmn:StartEvent", None))
///     .add(ElementRecord::shape("End", "bpmn:EndEvent", None))
///     .add(ElementRecord::connection("Flow", "bpmn:SequenceFlow", "Start", "End"));
///
/// let result = LayoutEngine::default()
///     .layout(&mut definitions, &LayoutOptions::default())
///     .expect("layout succeeds");
/// assert_eq!(result.element_count(), 3);
/// ```
pub struct LayoutEngine {
    config: LayoutConfig,
    solver: Box<dyn LayeredSolver>,
}

impl LayoutEngine {
    /// Creates an engine backed by the Sugiyama solver.
    pub fn new(config: LayoutConfig) -> Self {
        Self::with_solver(config, Box::new(SugiyamaSolver))
    }

    /// Creates an engine with a custom layered solver.
    pub fn with_solver(config: LayoutConfig, solver: Box<dyn LayeredSolver>) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lays out the diagram and writes shape bounds, waypoints and label
    /// bounds back to `model`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::GraphBuild`] for an inconsistent element tree and
    /// [`LayoutError::Solver`] when the layered solver fails. The model is not
    /// modified in either case.
    pub fn layout<M>(&self, model: &mut M, options: &LayoutOptions) -> Result<LayoutResult, LayoutError>
    where
        M: DiagramModel + ?Sized,
    {
        let elements = model.elements();
        let graph = build_graph(&elements)?;
        let laid_out = pipeline::run(graph, &self.config, options, self.solver.as_ref())?;

        let graph = laid_out.graph();
        for node in graph.nodes() {
            model.set_shape_bounds(&node.id().as_string(), node.bounds());
        }
        for edge in graph.edges() {
            model.set_waypoints(&edge.id().as_string(), edge.waypoints());
        }
        for label in laid_out.labels().labels() {
            model.set_label_bounds(&label.owner().as_string(), label.bounds());
        }

        let result = laid_out.into_result();
        info!(
            elements = result.element_count(),
            crossings = result.crossing_flows(),
            labels_moved = result.labels_moved();
            "Layout applied"
        );
        Ok(result)
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .finish()
    }
}
