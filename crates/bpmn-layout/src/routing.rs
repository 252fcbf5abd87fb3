//! Orthogonal edge routing.
//!
//! Waypoints are computed from the final node geometry, one edge at a time,
//! by the first matching rule:
//!
//! | Edge | Route |
//! |---|---|
//! | association | straight, between the facing border points |
//! | message flow | vertical between pools, one horizontal jog |
//! | self loop | around the top-right corner |
//! | from a boundary event | leaves the event's bottom |
//! | same row, forward | straight (off-path edges detour below the row) |
//! | stacked in one column | vertical, jogging in the gap between the rows |
//! | backward | loops below both nodes, or below the pool when crossing lanes |
//! | gateway to another row | L-bend from the gateway's bottom/top vertex |
//! | another row into a gateway | L-bend into the gateway's bottom/top vertex |
//! | anything else | Z-shaped |
//!
//! Sequence flows whose endpoints share a lane are clamped to the lane's
//! vertical range.

use log::{debug, trace};

use bpmn_layout_core::{
    geometry::{Bounds, EPSILON, Point},
    identifier::Id,
};

use crate::{
    classify::BranchClassification,
    config::{LayoutConfig, RoutingConfig},
    graph::{EdgeKind, LayoutEdge, LayoutGraph, NodeKind},
};

/// Maximum centre-Y difference of two nodes considered on the same row.
pub const SAME_ROW_TOLERANCE: f32 = 5.0;

/// Routes every edge and stores the waypoints on the graph. Returns the number
/// of edges routed.
pub fn route_edges(
    graph: &mut LayoutGraph,
    classification: &BranchClassification,
    config: &LayoutConfig,
) -> usize {
    let routing = config.routing();
    let routes: Vec<(Id, Vec<Point>)> = graph
        .edges()
        .map(|edge| {
            let mut waypoints = route_edge(graph, classification, routing, edge);
            if let Some(lane) = shared_lane(graph, edge) {
                clamp_to_lane(&mut waypoints, graph.bounds(lane), routing.lane_clamp_tolerance());
            }
            (edge.id(), simplify(&waypoints))
        })
        .collect();

    let count = routes.len();
    for (id, waypoints) in routes {
        trace!(edge = id.to_string(), points = waypoints.len(); "Edge routed");
        graph.set_waypoints(id, waypoints);
    }
    debug!(edges = count; "Edges routed");
    count
}

/// Computes the waypoints of a single edge, before lane clamping.
pub fn route_edge(
    graph: &LayoutGraph,
    classification: &BranchClassification,
    routing: &RoutingConfig,
    edge: &LayoutEdge,
) -> Vec<Point> {
    let source = graph.bounds(edge.source());
    let target = graph.bounds(edge.target());

    match edge.kind() {
        EdgeKind::Association => return straight(source, target),
        EdgeKind::MessageFlow => return vertical_with_jog(source, target),
        EdgeKind::SequenceFlow => {}
    }
    if edge.source() == edge.target() {
        return self_loop(source, routing.self_loop_offset());
    }
    if graph.kind(edge.source()) == Some(NodeKind::BoundaryEvent) {
        return from_boundary_event(source, target, routing.detour_clearance());
    }

    let source_kind = graph.kind(edge.source());
    let target_kind = graph.kind(edge.target());
    let from_gateway = source_kind.is_some_and(NodeKind::is_gateway);
    let into_gateway = target_kind.is_some_and(NodeKind::is_gateway);
    let same_row = (source.center().y() - target.center().y()).abs() <= SAME_ROW_TOLERANCE;
    let forward = target.center().x() > source.center().x();

    if same_row && forward {
        if from_gateway && classification.is_off_path(edge.id()) {
            let y = source.max_y().max(target.max_y()) + routing.detour_clearance();
            return loop_below(source, target, y);
        }
        let y = source.center().y();
        return vec![Point::new(source.max_x(), y), Point::new(target.min_x(), y)];
    }

    if !same_row && source.overlaps_horizontally(target) {
        return z_route(source, target);
    }

    if !forward {
        let crosses_lanes = graph.lane_of(edge.source()) != graph.lane_of(edge.target());
        let floor = if crosses_lanes {
            graph
                .pool_of(edge.source())
                .map(|pool| graph.bounds(pool).max_y())
                .unwrap_or_else(|| source.max_y().max(target.max_y()))
        } else {
            source.max_y().max(target.max_y())
        };
        return loop_below(source, target, floor + routing.detour_clearance());
    }

    if from_gateway && target.min_x() > source.center().x() {
        return out_of_gateway(source, target);
    }
    if into_gateway && source.max_x() < target.center().x() {
        return into_gateway_vertex(source, target);
    }
    z_route(source, target)
}

/// Straight line between the border points facing each other.
fn straight(source: Bounds, target: Bounds) -> Vec<Point> {
    vec![
        source.border_point_towards(target.center()),
        target.border_point_towards(source.center()),
    ]
}

fn vertical_with_jog(source: Bounds, target: Bounds) -> Vec<Point> {
    let downwards = target.center().y() >= source.center().y();
    let (start, end) = if downwards {
        (
            Point::new(source.center().x(), source.max_y()),
            Point::new(target.center().x(), target.min_y()),
        )
    } else {
        (
            Point::new(source.center().x(), source.min_y()),
            Point::new(target.center().x(), target.max_y()),
        )
    };
    if (start.x() - end.x()).abs() < EPSILON {
        return vec![start, end];
    }
    let mid_y = (start.y() + end.y()) / 2.0;
    vec![start, start.with_y(mid_y), end.with_y(mid_y), end]
}

/// Leaves the right side and comes back in through the top.
fn self_loop(node: Bounds, offset: f32) -> Vec<Point> {
    let center = node.center();
    let right = node.max_x() + offset;
    let top = node.min_y() - offset;
    vec![
        Point::new(node.max_x(), center.y()),
        Point::new(right, center.y()),
        Point::new(right, top),
        Point::new(center.x(), top),
        Point::new(center.x(), node.min_y()),
    ]
}

fn from_boundary_event(event: Bounds, target: Bounds, clearance: f32) -> Vec<Point> {
    let start = Point::new(event.center().x(), event.max_y());
    if target.min_y() > start.y() {
        if start.x() >= target.min_x() && start.x() <= target.max_x() {
            return vec![start, Point::new(start.x(), target.min_y())];
        }
        let end_x = if target.center().x() > start.x() {
            target.min_x()
        } else {
            target.max_x()
        };
        return vec![
            start,
            Point::new(start.x(), target.center().y()),
            Point::new(end_x, target.center().y()),
        ];
    }

    let y = start.y() + clearance;
    vec![
        start,
        start.with_y(y),
        Point::new(target.center().x(), y),
        Point::new(target.center().x(), target.max_y()),
    ]
}

/// Down from the source, across below `y` and up into the target.
fn loop_below(source: Bounds, target: Bounds, y: f32) -> Vec<Point> {
    vec![
        Point::new(source.center().x(), source.max_y()),
        Point::new(source.center().x(), y),
        Point::new(target.center().x(), y),
        Point::new(target.center().x(), target.max_y()),
    ]
}

/// L-bend from the gateway's bottom (or top) vertex into the target's left side.
fn out_of_gateway(gateway: Bounds, target: Bounds) -> Vec<Point> {
    let vertex_y = if target.center().y() > gateway.center().y() {
        gateway.max_y()
    } else {
        gateway.min_y()
    };
    let x = gateway.center().x();
    vec![
        Point::new(x, vertex_y),
        Point::new(x, target.center().y()),
        Point::new(target.min_x(), target.center().y()),
    ]
}

/// L-bend from the source's right side into the gateway's bottom (or top) vertex.
fn into_gateway_vertex(source: Bounds, gateway: Bounds) -> Vec<Point> {
    let vertex_y = if source.center().y() > gateway.center().y() {
        gateway.max_y()
    } else {
        gateway.min_y()
    };
    let y = source.center().y();
    vec![
        Point::new(source.max_x(), y),
        Point::new(gateway.center().x(), y),
        Point::new(gateway.center().x(), vertex_y),
    ]
}

fn z_route(source: Bounds, target: Bounds) -> Vec<Point> {
    if target.min_x() > source.max_x() {
        let mid_x = (source.max_x() + target.min_x()) / 2.0;
        return vec![
            Point::new(source.max_x(), source.center().y()),
            Point::new(mid_x, source.center().y()),
            Point::new(mid_x, target.center().y()),
            Point::new(target.min_x(), target.center().y()),
        ];
    }

    // Columns overlap; go through the horizontal gap between the rows
    let (start, end) = if target.center().y() > source.center().y() {
        (
            Point::new(source.center().x(), source.max_y()),
            Point::new(target.center().x(), target.min_y()),
        )
    } else {
        (
            Point::new(source.center().x(), source.min_y()),
            Point::new(target.center().x(), target.max_y()),
        )
    };
    let mid_y = (start.y() + end.y()) / 2.0;
    vec![start, start.with_y(mid_y), end.with_y(mid_y), end]
}

/// The lane both endpoints of a sequence flow live in, if they share one.
fn shared_lane(graph: &LayoutGraph, edge: &LayoutEdge) -> Option<Id> {
    if !edge.is_sequence_flow() {
        return None;
    }
    let lane = graph.lane_of(edge.source())?;
    (graph.lane_of(edge.target()) == Some(lane)).then_some(lane)
}

/// Clamps every waypoint's Y to the lane's range widened by `tolerance`.
pub fn clamp_to_lane(waypoints: &mut [Point], lane: Bounds, tolerance: f32) {
    let (low, high) = (lane.min_y() - tolerance, lane.max_y() + tolerance);
    for point in waypoints.iter_mut() {
        *point = point.with_y(point.y().clamp(low, high));
    }
}

/// Drops repeated points and the middle point of collinear axis-aligned runs,
/// always keeping both endpoints.
pub fn simplify(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    out.push(points[0]);
    for idx in 1..points.len() - 1 {
        let (prev, curr, next) = (out[out.len() - 1], points[idx], points[idx + 1]);
        if curr.approx_eq(prev, EPSILON) {
            continue;
        }
        let vertical = (prev.x() - curr.x()).abs() <= EPSILON && (curr.x() - next.x()).abs() <= EPSILON;
        let horizontal = (prev.y() - curr.y()).abs() <= EPSILON && (curr.y() - next.y()).abs() <= EPSILON;
        if vertical || horizontal {
            continue;
        }
        out.push(curr);
    }
    let last = points[points.len() - 1];
    if out.len() < 2 || !last.approx_eq(out[out.len() - 1], EPSILON) {
        out.push(last);
    }
    out
}
