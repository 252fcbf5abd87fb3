//! Pairwise edge crossing detection over routed waypoints.
//!
//! Every segment of every edge is tested against every segment of every other
//! edge. Edges that share an end node necessarily meet at that node, so for
//! them only proper crossings (both segments strictly straddling each other)
//! are counted; for all other pairs, touching and collinear overlaps count too.

use log::debug;
use serde::Serialize;

use bpmn_layout_core::{
    geometry::{EPSILON, Point, Segment, polyline_segments},
    identifier::Id,
};

use crate::graph::{LayoutEdge, LayoutGraph};

/// Crossing edge pairs found after routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossingReport {
    pairs: Vec<(Id, Id)>,
}

impl CrossingReport {
    /// Number of crossing edge pairs.
    pub fn count(&self) -> usize {
        self.pairs.len()
    }

    /// Crossing edge pairs, each ordered by declaration and listed once.
    pub fn pairs(&self) -> &[(Id, Id)] {
        &self.pairs
    }

    pub fn contains(&self, a: Id, b: Id) -> bool {
        self.pairs
            .iter()
            .any(|&(first, second)| (first, second) == (a, b) || (first, second) == (b, a))
    }

    /// Pairs as edge id strings, in the shape reported to callers.
    pub fn string_pairs(&self) -> Vec<CrossingPair> {
        self.pairs
            .iter()
            .map(|(a, b)| CrossingPair(a.to_string(), b.to_string()))
            .collect()
    }
}

/// A crossing edge pair, serialised as `[a, b]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossingPair(pub String, pub String);

/// Finds every pair of edges whose routed polylines cross.
pub fn detect_crossings(graph: &LayoutGraph) -> CrossingReport {
    let edges: Vec<&LayoutEdge> = graph
        .edges()
        .filter(|edge| edge.waypoints().len() >= 2)
        .collect();

    let mut pairs = Vec::new();
    for (idx, first) in edges.iter().enumerate() {
        for second in &edges[idx + 1..] {
            if edges_cross(first, second) {
                pairs.push((first.id(), second.id()));
            }
        }
    }

    debug!(edges = edges.len(), crossings = pairs.len(); "Crossings detected");
    CrossingReport { pairs }
}

fn edges_cross(first: &LayoutEdge, second: &LayoutEdge) -> bool {
    let share_node = first.source() == second.source()
        || first.source() == second.target()
        || first.target() == second.source()
        || first.target() == second.target();

    polyline_segments(first.waypoints()).any(|a| {
        polyline_segments(second.waypoints()).any(|b| {
            if share_node {
                crosses_properly(a, b)
            } else {
                !a.shares_endpoint(b) && a.intersects(b)
            }
        })
    })
}

/// True if each segment strictly straddles the line through the other.
pub fn crosses_properly(a: Segment, b: Segment) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f32 {
        (b.x() - a.x()) * (c.y() - a.y()) - (b.y() - a.y()) * (c.x() - a.x())
    }
    fn straddles(o1: f32, o2: f32) -> bool {
        (o1 > EPSILON && o2 < -EPSILON) || (o1 < -EPSILON && o2 > EPSILON)
    }

    straddles(orient(a.start(), a.end(), b.start()), orient(a.start(), a.end(), b.end()))
        && straddles(orient(b.start(), b.end(), a.start()), orient(b.start(), b.end(), a.end()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{graph::builder::build, model::ElementRecord};

    fn graph_with_routes(routes: &[(&str, &str, &str, Vec<Point>)]) -> LayoutGraph {
        let mut elements: Vec<ElementRecord> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|id| ElementRecord::shape(id, "bpmn:Task", None))
            .collect();
        for (id, source, target, _) in routes {
            elements.push(ElementRecord::connection(id, "bpmn:SequenceFlow", source, target));
        }
        let mut graph = build(&elements).expect("valid graph");
        for (id, _, _, points) in routes {
            graph.set_waypoints(Id::new(id), points.clone());
        }
        graph
    }

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_x_shape_is_one_crossing() {
        let graph = graph_with_routes(&[
            ("E1", "A", "B", vec![p(0.0, 0.0), p(100.0, 100.0)]),
            ("E2", "C", "D", vec![p(0.0, 100.0), p(100.0, 0.0)]),
        ]);

        let report = detect_crossings(&graph);

        assert_eq!(report.count(), 1);
        assert!(report.contains(Id::new("E2"), Id::new("E1")));
        assert_eq!(
            report.string_pairs(),
            vec![CrossingPair("E1".to_string(), "E2".to_string())]
        );
    }

    #[test]
    fn test_fan_out_from_shared_source_does_not_cross() {
        let graph = graph_with_routes(&[
            ("E1", "A", "B", vec![p(0.0, 0.0), p(100.0, 0.0)]),
            ("E2", "A", "C", vec![p(0.0, 0.0), p(0.0, 50.0), p(100.0, 50.0)]),
            ("E3", "A", "D", vec![p(0.0, 0.0), p(0.0, 100.0), p(100.0, 100.0)]),
        ]);

        assert_eq!(detect_crossings(&graph).count(), 0);
    }

    #[test]
    fn test_shared_node_still_counts_proper_crossing() {
        let graph = graph_with_routes(&[
            ("E1", "A", "B", vec![p(0.0, 50.0), p(200.0, 50.0)]),
            ("E2", "A", "C", vec![p(50.0, 0.0), p(50.0, 100.0)]),
        ]);

        assert_eq!(detect_crossings(&graph).count(), 1);
    }

    #[test]
    fn test_collinear_overlap_counts_for_unrelated_edges() {
        let graph = graph_with_routes(&[
            ("E1", "A", "B", vec![p(0.0, 0.0), p(100.0, 0.0)]),
            ("E2", "C", "D", vec![p(50.0, 0.0), p(150.0, 0.0)]),
        ]);

        assert_eq!(detect_crossings(&graph).count(), 1);
    }

    proptest! {
        #[test]
        fn prop_count_is_translation_invariant(
            coords in prop::collection::vec(0..50i32, 8),
            dx in -20..20i32,
            dy in -20..20i32,
        ) {
            let route = |offset_x: f32, offset_y: f32, start: usize| -> Vec<Point> {
                coords[start..start + 4]
                    .chunks(2)
                    .map(|pair| p(pair[0] as f32 + offset_x, pair[1] as f32 + offset_y))
                    .collect()
            };
            let original = graph_with_routes(&[
                ("E1", "A", "B", route(0.0, 0.0, 0)),
                ("E2", "C", "D", route(0.0, 0.0, 4)),
            ]);
            let (dx, dy) = (dx as f32, dy as f32);
            let moved = graph_with_routes(&[
                ("E1", "A", "B", route(dx, dy, 0)),
                ("E2", "C", "D", route(dx, dy, 4)),
            ]);

            prop_assert_eq!(detect_crossings(&original).count(), detect_crossings(&moved).count());
        }
    }
}
