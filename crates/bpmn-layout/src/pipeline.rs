//! The staged layout pipeline.
//!
//! Stages run strictly in order on one [`LayoutGraph`], each recorded in the
//! invocation's [`LayoutLog`]. A solver failure aborts before any geometry is
//! written back.

use log::{debug, info};
use serde::Serialize;

use crate::{
    artifacts::place_artifacts,
    boundary::position_chains,
    classify::classify,
    config::{LayoutConfig, LayoutOptions},
    containers::{ExpansionNeed, expansion_needs, refit_subprocesses, resolve_pools},
    crossings::{CrossingPair, CrossingReport, detect_crossings},
    diagnostics::{LayoutLog, StepRecord},
    error::LayoutSolverError,
    graph::LayoutGraph,
    labels::{LabelLayout, place_labels},
    placement::{LayeredSolver, grid::compose_scopes, place},
    routing::route_edges,
    rows::order_rows,
};

/// Summary of one layout invocation, reported to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    element_count: usize,
    labels_moved: usize,
    crossing_flows: usize,
    crossing_flow_pairs: Vec<CrossingPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool_expansion_applied: Option<bool>,
    expansion_needs: Vec<ExpansionNeed>,
    steps: Vec<StepRecord>,
}

impl LayoutResult {
    /// Number of laid out nodes and edges.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn labels_moved(&self) -> usize {
        self.labels_moved
    }

    /// Number of crossing flow pairs.
    pub fn crossing_flows(&self) -> usize {
        self.crossing_flows
    }

    pub fn crossing_flow_pairs(&self) -> &[CrossingPair] {
        &self.crossing_flow_pairs
    }

    /// `None` when the diagram has no participants.
    pub fn pool_expansion_applied(&self) -> Option<bool> {
        self.pool_expansion_applied
    }

    /// Lanes that were too small for their elements before layout.
    pub fn expansion_needs(&self) -> &[ExpansionNeed] {
        &self.expansion_needs
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }
}

/// Everything produced by a pipeline run.
#[derive(Debug)]
pub struct LaidOut {
    graph: LayoutGraph,
    labels: LabelLayout,
    crossings: CrossingReport,
    result: LayoutResult,
}

impl LaidOut {
    /// The graph with final node bounds and edge waypoints.
    pub fn graph(&self) -> &LayoutGraph {
        &self.graph
    }

    pub fn labels(&self) -> &LabelLayout {
        &self.labels
    }

    pub fn crossings(&self) -> &CrossingReport {
        &self.crossings
    }

    pub fn result(&self) -> &LayoutResult {
        &self.result
    }

    pub fn into_result(self) -> LayoutResult {
        self.result
    }
}

/// Runs every stage on `graph`.
///
/// # Errors
///
/// Returns [`LayoutSolverError`] when the layered solver fails; no later stage
/// runs in that case.
pub fn run(
    mut graph: LayoutGraph,
    config: &LayoutConfig,
    options: &LayoutOptions,
    solver: &dyn LayeredSolver,
) -> Result<LaidOut, LayoutSolverError> {
    info!(nodes = graph.node_count(), edges = graph.edge_count(), solver = solver.name(); "Running layout pipeline");
    let mut log = LayoutLog::new();
    let needs = expansion_needs(&graph, config);

    let classification = log.step("classify", &mut graph, |graph| {
        classify(graph, config.traversal())
    });

    let placement = log.step("placement", &mut graph, |graph| {
        let placement = place(graph, &classification, solver)?;
        compose_scopes(graph, placement.scopes(), placement.cells(), config);
        Ok::<_, LayoutSolverError>(placement)
    })?;

    log.step("rows", &mut graph, |graph| {
        let cells = order_rows(graph, &classification, &placement, config.traversal());
        compose_scopes(graph, placement.scopes(), &cells, config);
    });

    log.step("artifacts", &mut graph, place_artifacts);

    let has_participants = !graph.participants().is_empty();
    let expand = options.pool_expansion().unwrap_or(true);
    let pool_expansion_applied = has_participants.then_some(expand);
    log.step("containers", &mut graph, |graph| resolve_pools(graph, config, expand));

    log.step("boundary-chains", &mut graph, |graph| {
        position_chains(graph, config);
        refit_subprocesses(graph, config);
        resolve_pools(graph, config, expand);
    });

    let grid = options.grid_snap();
    if let Some(grid) = grid {
        log.step("grid-snap", &mut graph, |graph| snap_shapes(graph, grid));
    }

    log.step("routing", &mut graph, |graph| {
        route_edges(graph, &classification, config)
    });

    let mut labels = log.step("labels", &mut graph, |graph| place_labels(graph, config));

    if let Some(grid) = grid {
        snap_waypoints(&mut graph, grid);
        for label in labels.labels_mut() {
            label.snap(grid);
        }
    }

    let crossings = log.step("crossings", &mut graph, |graph| detect_crossings(graph));

    debug!(
        steps = log.steps().len(),
        micros = log.total_duration().as_micros() as u64;
        "Layout pipeline finished"
    );
    let result = LayoutResult {
        element_count: graph.node_count() + graph.edge_count(),
        labels_moved: labels.moved(),
        crossing_flows: crossings.count(),
        crossing_flow_pairs: crossings.string_pairs(),
        pool_expansion_applied,
        expansion_needs: needs,
        steps: log.into_steps(),
    };
    Ok(LaidOut {
        graph,
        labels,
        crossings,
        result,
    })
}

fn snap_shapes(graph: &mut LayoutGraph, grid: f32) {
    let snapped: Vec<_> = graph
        .nodes()
        .map(|node| (node.id(), node.bounds().snap(grid)))
        .collect();
    for (id, bounds) in snapped {
        graph.set_bounds(id, bounds);
    }
}

fn snap_waypoints(graph: &mut LayoutGraph, grid: f32) {
    let snapped: Vec<_> = graph
        .edges()
        .map(|edge| {
            let points = edge.waypoints().iter().map(|point| point.snap(grid)).collect();
            (edge.id(), points)
        })
        .collect();
    for (id, points) in snapped {
        graph.set_waypoints(id, points);
    }
}

#[cfg(test)]
mod tests {
    use bpmn_layout_core::identifier::Id;

    use super::*;
    use crate::{
        graph::builder::build,
        model::ElementRecord,
        placement::LongestPathSolver,
    };

    fn linear() -> LayoutGraph {
        build(&[
            ElementRecord::shape("Start", "bpmn:StartEvent", None),
            ElementRecord::shape("Task", "bpmn:Task", None),
            ElementRecord::shape("End", "bpmn:EndEvent", None),
            ElementRecord::connection("F1", "bpmn:SequenceFlow", "Start", "Task"),
            ElementRecord::connection("F2", "bpmn:SequenceFlow", "Task", "End"),
        ])
        .expect("valid graph")
    }

    #[test]
    fn test_every_stage_is_recorded() {
        let laid_out = run(
            linear(),
            &LayoutConfig::default(),
            &LayoutOptions::default(),
            &LongestPathSolver,
        )
        .expect("layout succeeds");

        let names: Vec<&str> = laid_out.result().steps().iter().map(StepRecord::name).collect();
        assert_eq!(
            names,
            [
                "classify",
                "placement",
                "rows",
                "artifacts",
                "containers",
                "boundary-chains",
                "routing",
                "labels",
                "crossings"
            ]
        );
        assert_eq!(laid_out.result().element_count(), 5);
        assert_eq!(laid_out.result().pool_expansion_applied(), None);
        assert_eq!(laid_out.result().crossing_flows(), 0);
    }

    #[test]
    fn test_grid_snap_rounds_coordinates() {
        let options = LayoutOptions::default().with_grid_snap(10.0);
        let laid_out = run(linear(), &LayoutConfig::default(), &options, &LongestPathSolver)
            .expect("layout succeeds");

        let graph = laid_out.graph();
        for id in ["Start", "Task", "End"] {
            let top_left = graph.bounds(Id::new(id)).min_point();
            assert_eq!(top_left.x() % 10.0, 0.0, "{id} x not snapped");
            assert_eq!(top_left.y() % 10.0, 0.0, "{id} y not snapped");
        }
        for edge in graph.edges() {
            assert!(edge.waypoints().iter().all(|point| point.x() % 10.0 == 0.0));
        }
        assert!(laid_out.result().steps().iter().any(|step| step.name() == "grid-snap"));
    }

    #[test]
    fn test_result_serialises_camel_case() {
        let laid_out = run(
            linear(),
            &LayoutConfig::default(),
            &LayoutOptions::default(),
            &LongestPathSolver,
        )
        .expect("layout succeeds");

        let json = serde_json::to_value(laid_out.result()).expect("serialisable");
        assert_eq!(json["elementCount"], 5);
        assert_eq!(json["crossingFlows"], 0);
        assert!(json.get("poolExpansionApplied").is_none());
        assert!(json["crossingFlowPairs"].as_array().is_some_and(Vec::is_empty));
    }
}
