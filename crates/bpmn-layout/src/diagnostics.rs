//! Per-invocation diagnostics: step timings and moved counts.
//!
//! A [`LayoutLog`] is created by every layout call and handed explicitly to
//! each stage. Nothing is shared between invocations.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::debug;
use serde::Serialize;

use bpmn_layout_core::{geometry::Point, identifier::Id};

use crate::graph::LayoutGraph;

/// Immutable top-left positions of every node, taken between stages.
#[derive(Debug, Clone, Default)]
pub struct PositionSnapshot {
    positions: HashMap<Id, Point>,
}

impl PositionSnapshot {
    /// Captures the current position of every node in `graph`.
    pub fn capture(graph: &LayoutGraph) -> Self {
        let positions = graph
            .nodes()
            .map(|node| (node.id(), node.bounds().min_point()))
            .collect();
        Self { positions }
    }

    pub fn get(&self, id: Id) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of nodes whose position differs from `later` by more than half a pixel.
    /// Nodes missing from either snapshot are not counted.
    pub fn moved_count(&self, later: &PositionSnapshot) -> usize {
        self.positions
            .iter()
            .filter(|(id, before)| {
                later
                    .get(**id)
                    .is_some_and(|after| !before.approx_eq(after, 0.5))
            })
            .count()
    }
}

/// One recorded pipeline stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    name: &'static str,
    #[serde(serialize_with = "serialize_millis", rename = "durationMs")]
    duration: Duration,
    moved: usize,
}

impl StepRecord {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of nodes the stage moved.
    pub fn moved(&self) -> usize {
        self.moved
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Step log threaded through one layout invocation.
#[derive(Debug, Default)]
pub struct LayoutLog {
    steps: Vec<StepRecord>,
}

impl LayoutLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `stage` on the graph and records its duration and moved count.
    pub fn step<T>(
        &mut self,
        name: &'static str,
        graph: &mut LayoutGraph,
        stage: impl FnOnce(&mut LayoutGraph) -> T,
    ) -> T {
        let before = PositionSnapshot::capture(graph);
        let started = Instant::now();
        let output = stage(graph);
        let duration = started.elapsed();
        let moved = before.moved_count(&PositionSnapshot::capture(graph));

        debug!(
            step = name,
            moved,
            micros = duration.as_micros() as u64;
            "Layout step finished"
        );
        self.steps.push(StepRecord {
            name,
            duration,
            moved,
        });
        output
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(StepRecord::duration).sum()
    }

    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::builder::build, model::ElementRecord};

    #[test]
    fn test_step_counts_moved_nodes() {
        let mut graph = build(&[
            ElementRecord::shape("A", "bpmn:Task", None),
            ElementRecord::shape("B", "bpmn:Task", None),
        ])
        .expect("valid graph");

        let mut log = LayoutLog::new();
        let returned = log.step("shift", &mut graph, |graph| {
            graph.translate_nodes(&[Id::new("A")], Point::new(10.0, 0.0));
            7
        });
        log.step("idle", &mut graph, |_| ());

        assert_eq!(returned, 7);
        assert_eq!(log.steps().len(), 2);
        assert_eq!(log.steps()[0].name(), "shift");
        assert_eq!(log.steps()[0].moved(), 1);
        assert_eq!(log.steps()[1].moved(), 0);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_moves() {
        let mut graph = build(&[ElementRecord::shape("A", "bpmn:Task", None)]).expect("valid graph");
        let snapshot = PositionSnapshot::capture(&graph);
        let original = snapshot.get(Id::new("A")).expect("captured");

        let bounds = graph.bounds(Id::new("A"));
        graph.set_bounds(Id::new("A"), bounds.translate(Point::new(0.0, 40.0)));

        assert_eq!(snapshot.get(Id::new("A")), Some(original));
        assert_eq!(snapshot.moved_count(&PositionSnapshot::capture(&graph)), 1);
    }
}
