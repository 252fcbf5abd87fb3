//! Grid composition: turns `(column, row)` cells into pixel positions.
//!
//! Every column is as wide as its widest node and every row as tall as its
//! tallest node; nodes are centred in their cell. Scopes are composed in
//! post-order, so an expanded subprocess is sized to its content before the
//! enclosing scope positions it (moving its content along).

use std::collections::{BTreeMap, HashMap};

use log::trace;

use bpmn_layout_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

use super::{GridCell, ScopeLayout};
use crate::{
    config::LayoutConfig,
    graph::{LayoutGraph, NodeKind},
};

/// Composes every scope and attaches boundary events to their hosts.
pub fn compose_scopes(
    graph: &mut LayoutGraph,
    scopes: &[ScopeLayout],
    cells: &HashMap<Id, GridCell>,
    config: &LayoutConfig,
) {
    for scope in scopes {
        let origin = match scope.scope() {
            None => {
                let (x, y) = config.spacing().origin();
                Point::new(x, y)
            }
            Some(_) => Point::default(),
        };
        let content = compose(graph, scope.members(), cells, config, origin);

        let (Some(container), Some(content)) = (scope.scope(), content) else {
            continue;
        };
        if graph.kind(container) == Some(NodeKind::SubProcess) {
            let bounds = content.add_padding(config.spacing().subprocess_padding());
            graph.set_bounds(container, bounds);
            attach_boundary_events(graph, container);
        }
    }
}

/// Positions `members` on the grid starting at `origin` and returns the union
/// of their bounds.
pub fn compose(
    graph: &mut LayoutGraph,
    members: &[Id],
    cells: &HashMap<Id, GridCell>,
    config: &LayoutConfig,
    origin: Point,
) -> Option<Bounds> {
    let placed: Vec<(Id, GridCell, Size)> = members
        .iter()
        .filter_map(|&id| {
            cells
                .get(&id)
                .map(|&cell| (id, cell, graph.bounds(id).to_size()))
        })
        .collect();
    if placed.is_empty() {
        return None;
    }

    let mut widths: BTreeMap<usize, f32> = BTreeMap::new();
    let mut heights: BTreeMap<usize, f32> = BTreeMap::new();
    for (_, cell, size) in &placed {
        let width = widths.entry(cell.column).or_default();
        *width = width.max(size.width());
        let height = heights.entry(cell.row).or_default();
        *height = height.max(size.height());
    }

    let spacing = config.spacing();
    let column_left = offsets(&widths, origin.x(), spacing.horizontal_gap());
    let row_top = offsets(&heights, origin.y(), spacing.vertical_gap());

    for &(id, cell, size) in &placed {
        let center = Point::new(
            column_left[&cell.column] + widths[&cell.column] / 2.0,
            row_top[&cell.row] + heights[&cell.row] / 2.0,
        );
        let top_left = Bounds::new_from_center(center, size).min_point();
        trace!(id = id.to_string(), x = top_left.x(), y = top_left.y(); "Composed node");
        graph.move_to(id, top_left);
        attach_boundary_events(graph, id);
    }

    graph.union_bounds(members)
}

/// Start coordinate of every occupied column or row.
fn offsets(extents: &BTreeMap<usize, f32>, start: f32, gap: f32) -> HashMap<usize, f32> {
    let mut result = HashMap::with_capacity(extents.len());
    let mut cursor = start;
    for (&index, &extent) in extents {
        result.insert(index, cursor);
        cursor += extent + gap;
    }
    result
}

/// Spreads the boundary events of `host` evenly along its bottom border.
pub fn attach_boundary_events(graph: &mut LayoutGraph, host: Id) {
    let events = graph.boundary_events_of(host).to_vec();
    if events.is_empty() {
        return;
    }
    let host_bounds = graph.bounds(host);
    let slots = events.len() as f32 + 1.0;
    for (idx, event) in events.into_iter().enumerate() {
        let center = Point::new(
            host_bounds.min_x() + host_bounds.width() * (idx as f32 + 1.0) / slots,
            host_bounds.max_y(),
        );
        let size = graph.bounds(event).to_size();
        graph.set_bounds(event, Bounds::new_from_center(center, size));
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::{graph::builder::build, model::ElementRecord};

    #[test]
    fn test_nodes_centred_in_cells() {
        let mut graph = build(&[
            ElementRecord::shape("Start", "bpmn:StartEvent", None),
            ElementRecord::shape("Task", "bpmn:Task", None),
            ElementRecord::shape("Below", "bpmn:Task", None),
        ])
        .expect("valid graph");
        let (start, task, below) = (Id::new("Start"), Id::new("Task"), Id::new("Below"));
        let cells = HashMap::from([
            (start, GridCell::new(0, 0)),
            (task, GridCell::new(1, 0)),
            (below, GridCell::new(1, 1)),
        ]);

        let config = LayoutConfig::default();
        let content = compose(&mut graph, &[start, task, below], &cells, &config, Point::default())
            .expect("content exists");

        assert!(approx_eq!(f32, graph.bounds(start).center().y(), 40.0));
        assert!(approx_eq!(f32, graph.bounds(task).center().y(), 40.0));
        assert!(approx_eq!(f32, graph.bounds(task).min_x(), 36.0 + 50.0));
        assert!(approx_eq!(f32, graph.bounds(below).min_y(), 80.0 + 50.0));
        assert!(approx_eq!(f32, content.height(), 210.0));
    }

    #[test]
    fn test_boundary_events_spread_on_bottom_border() {
        let mut graph = build(&[
            ElementRecord::shape("Task", "bpmn:Task", None),
            ElementRecord::shape("E1", "bpmn:BoundaryEvent", None).with_attached_to("Task"),
            ElementRecord::shape("E2", "bpmn:BoundaryEvent", None).with_attached_to("Task"),
        ])
        .expect("valid graph");

        attach_boundary_events(&mut graph, Id::new("Task"));

        let task = graph.bounds(Id::new("Task"));
        let first = graph.bounds(Id::new("E1"));
        let second = graph.bounds(Id::new("E2"));
        assert!(approx_eq!(f32, first.center().y(), task.max_y()));
        assert!(first.center().x() < second.center().x());
        assert!(task.contains_point(first.center()));
    }
}
