//! Placement of artifacts: text annotations, data objects and data stores.
//!
//! Artifacts are not layered. Each one is put next to the first flow node it
//! is associated with: annotations above-right, data objects and stores
//! below-right. Unassociated artifacts line up under their container's
//! content. Runs before container sizing so pools and lanes enclose them.

use log::debug;

use bpmn_layout_core::{
    geometry::{Bounds, Point},
    identifier::Id,
};

use crate::graph::{EdgeKind, LayoutGraph, NodeKind};

/// Horizontal and vertical distance kept from the anchor node.
const ANCHOR_GAP: f32 = 20.0;

/// Number of sideways attempts before an overlapping artifact is left as is.
const MAX_SHIFTS: usize = 4;

/// Positions every artifact and returns how many were placed.
pub fn place_artifacts(graph: &mut LayoutGraph) -> usize {
    let artifacts: Vec<(Id, NodeKind)> = graph
        .nodes()
        .filter(|node| node.kind().is_artifact())
        .map(|node| (node.id(), node.kind()))
        .collect();

    let mut placed: Vec<Bounds> = Vec::new();
    let mut loose_cursor: Option<Point> = None;
    for &(id, kind) in &artifacts {
        let size = graph.bounds(id).to_size();
        let top_left = match anchor_of(graph, id) {
            Some(anchor) => {
                let anchor = graph.bounds(anchor);
                if kind == NodeKind::TextAnnotation {
                    Point::new(anchor.max_x() + ANCHOR_GAP, anchor.min_y() - ANCHOR_GAP - size.height())
                } else {
                    Point::new(anchor.max_x() + ANCHOR_GAP, anchor.max_y() + ANCHOR_GAP)
                }
            }
            None => {
                let cursor = *loose_cursor.get_or_insert_with(|| loose_origin(graph, id));
                loose_cursor = Some(cursor.add_point(Point::new(size.width() + ANCHOR_GAP, 0.0)));
                cursor
            }
        };

        let mut bounds = Bounds::new_from_top_left(top_left, size);
        for _ in 0..MAX_SHIFTS {
            let blocked = graph
                .nodes()
                .filter(|node| node.kind().is_layered() || node.kind() == NodeKind::BoundaryEvent)
                .filter(|node| !is_expanded_container(graph, node.id()))
                .map(|node| node.bounds())
                .chain(placed.iter().copied())
                .any(|other| other.intersects(bounds));
            if !blocked {
                break;
            }
            bounds = bounds.translate(Point::new(size.width() + ANCHOR_GAP, 0.0));
        }

        graph.set_bounds(id, bounds);
        placed.push(bounds);
    }

    debug!(artifacts = artifacts.len(); "Artifacts placed");
    artifacts.len()
}

/// First layered node linked to the artifact by an association.
fn anchor_of(graph: &LayoutGraph, artifact: Id) -> Option<Id> {
    graph
        .edges()
        .filter(|edge| edge.kind() == EdgeKind::Association)
        .filter_map(|edge| {
            if edge.source() == artifact {
                Some(edge.target())
            } else if edge.target() == artifact {
                Some(edge.source())
            } else {
                None
            }
        })
        .find(|&other| graph.kind(other).is_some_and(|kind| !kind.is_artifact()))
}

/// Below the content of the artifact's scope, or below everything.
fn loose_origin(graph: &LayoutGraph, artifact: Id) -> Point {
    let scope = graph.scope_of(artifact);
    let members = graph.scope_members(scope);
    let content = if members.is_empty() {
        graph
            .nodes()
            .filter(|node| node.kind().is_layered())
            .map(|node| node.bounds())
            .reduce(|acc, bounds| acc.merge(&bounds))
    } else {
        graph.union_bounds(&members)
    };
    content
        .map(|content| Point::new(content.min_x(), content.max_y() + ANCHOR_GAP * 2.0))
        .unwrap_or_default()
}

fn is_expanded_container(graph: &LayoutGraph, id: Id) -> bool {
    graph.kind(id) == Some(NodeKind::SubProcess) && !graph.containment().children(id).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    use bpmn_layout_core::geometry::Size;

    use crate::{graph::builder::build, model::ElementRecord};

    #[test]
    fn test_annotation_above_right_data_below_right() {
        let task_bounds = Bounds::new_from_top_left(Point::new(100.0, 100.0), Size::new(100.0, 80.0));
        let mut graph = build(&[
            ElementRecord::shape("Task", "bpmn:Task", None).with_bounds(task_bounds),
            ElementRecord::shape("Note", "bpmn:TextAnnotation", None),
            ElementRecord::shape("Doc", "bpmn:DataObjectReference", None),
            ElementRecord::connection("A1", "bpmn:Association", "Task", "Note"),
            ElementRecord::connection("A2", "bpmn:DataOutputAssociation", "Task", "Doc"),
        ])
        .expect("valid graph");

        assert_eq!(place_artifacts(&mut graph), 2);

        let note = graph.bounds(Id::new("Note"));
        let doc = graph.bounds(Id::new("Doc"));
        assert!(note.min_x() > task_bounds.max_x());
        assert!(note.max_y() < task_bounds.min_y());
        assert!(doc.min_x() > task_bounds.max_x());
        assert!(doc.min_y() > task_bounds.max_y());
    }

    #[test]
    fn test_loose_artifacts_go_below_content() {
        let task_bounds = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(100.0, 80.0));
        let mut graph = build(&[
            ElementRecord::shape("Task", "bpmn:Task", None).with_bounds(task_bounds),
            ElementRecord::shape("Store", "bpmn:DataStoreReference", None),
            ElementRecord::shape("Note", "bpmn:TextAnnotation", None),
        ])
        .expect("valid graph");

        place_artifacts(&mut graph);

        let store = graph.bounds(Id::new("Store"));
        let note = graph.bounds(Id::new("Note"));
        assert!(store.min_y() > task_bounds.max_y());
        assert!(!store.intersects(note));
    }
}
