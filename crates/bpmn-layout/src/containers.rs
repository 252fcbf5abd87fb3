//! Pool and lane geometry.
//!
//! Pools are stacked top to bottom in declaration order. Inside a pool every
//! lane becomes a horizontal band sized to the vertical span of the elements it
//! owns, and the pool is widened to its content. With expansion disabled the
//! existing pool and lane bounds are kept and only the content is moved into
//! its band.
//!
//! Expanded subprocesses are refitted separately by [`refit_subprocesses`].

use log::{debug, trace};
use serde::Serialize;

use bpmn_layout_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

use crate::{
    config::{ContainerConfig, LayoutConfig},
    graph::{LayoutGraph, NodeKind},
    placement::grid::attach_boundary_events,
};

/// A lane whose height cannot hold the elements assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionNeed {
    lane: String,
    elements: usize,
    current_height: f32,
    min_height: f32,
}

impl ExpansionNeed {
    pub fn lane(&self) -> &str {
        &self.lane
    }

    /// Number of elements assigned to the lane.
    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    pub fn min_height(&self) -> f32 {
        self.min_height
    }
}

/// Lanes whose current height is below the count-based estimate
/// `elements × element height + 2 × margin`, floored at the minimum lane height.
///
/// Lanes without assigned elements are never reported.
pub fn expansion_needs(graph: &LayoutGraph, config: &LayoutConfig) -> Vec<ExpansionNeed> {
    let containers = config.containers();
    let mut needs = Vec::new();
    for pool in graph.participants() {
        for lane in graph.lanes_of(pool) {
            let elements = direct_members(graph, lane)
                .into_iter()
                .filter(|&id| graph.kind(id).is_some_and(|kind| !kind.is_artifact()))
                .count();
            if elements == 0 {
                continue;
            }
            let min_height = containers.lane_min_height().max(
                elements as f32 * containers.lane_element_height() + 2.0 * containers.lane_margin(),
            );
            let current_height = graph.bounds(lane).height();
            if current_height + 0.5 < min_height {
                needs.push(ExpansionNeed {
                    lane: lane.to_string(),
                    elements,
                    current_height,
                    min_height,
                });
            }
        }
    }
    needs
}

/// Horizontal slice of a pool: the elements of one lane, or the pool's own
/// elements when they are not claimed by any lane.
#[derive(Debug)]
struct Band {
    lane: Option<Id>,
    members: Vec<Id>,
}

/// Sizes and positions every pool and lane.
///
/// Does nothing for diagrams without participants. Returns the number of pools
/// processed.
pub fn resolve_pools(graph: &mut LayoutGraph, config: &LayoutConfig, expand: bool) -> usize {
    let participants = graph.participants();
    if participants.is_empty() {
        return 0;
    }

    let containers = config.containers();
    let (origin_x, origin_y) = config.spacing().origin();
    let free_content = graph.union_bounds(&graph.scope_members(None));
    let mut cursor_y = free_content.map_or(origin_y, |content| {
        content.max_y() + containers.pool_gap()
    });

    for &pool in &participants {
        let bands = collect_bands(graph, pool);
        let frame = if expand {
            expand_pool(graph, containers, pool, &bands, Point::new(origin_x, cursor_y))
        } else {
            fit_into_pool(graph, containers, pool, &bands)
        };
        trace!(pool = pool.to_string(), bands = bands.len(), height = frame.height(); "Pool resolved");
        cursor_y = frame.max_y() + containers.pool_gap();
    }

    debug!(pools = participants.len(), expand; "Pool and lane geometry resolved");
    participants.len()
}

/// Containment children of a container that are laid out inside it.
fn direct_members(graph: &LayoutGraph, container: Id) -> Vec<Id> {
    graph
        .containment()
        .children(container)
        .iter()
        .copied()
        .filter(|&child| {
            !matches!(
                graph.kind(child),
                Some(NodeKind::Lane | NodeKind::BoundaryEvent) | None
            )
        })
        .collect()
}

fn collect_bands(graph: &LayoutGraph, pool: Id) -> Vec<Band> {
    let lanes = graph.lanes_of(pool);
    let direct = direct_members(graph, pool);
    if lanes.is_empty() {
        return vec![Band {
            lane: None,
            members: direct,
        }];
    }

    let mut bands: Vec<Band> = lanes
        .into_iter()
        .map(|lane| Band {
            lane: Some(lane),
            members: direct_members(graph, lane),
        })
        .collect();

    // Artifacts are rarely claimed by a lane; keep them with the band they sit next to.
    let mut loose = Vec::new();
    for id in direct {
        if graph.kind(id).is_some_and(NodeKind::is_artifact) {
            if let Some(idx) = nearest_band(graph, &bands, id) {
                bands[idx].members.push(id);
                continue;
            }
        }
        loose.push(id);
    }
    if !loose.is_empty() {
        bands.push(Band {
            lane: None,
            members: loose,
        });
    }
    bands
}

/// Band whose content is vertically closest to the node.
fn nearest_band(graph: &LayoutGraph, bands: &[Band], id: Id) -> Option<usize> {
    let center_y = graph.bounds(id).center().y();
    bands
        .iter()
        .enumerate()
        .filter_map(|(idx, band)| {
            let span = graph.union_bounds(&band.members)?;
            let distance = if center_y < span.min_y() {
                span.min_y() - center_y
            } else if center_y > span.max_y() {
                center_y - span.max_y()
            } else {
                0.0
            };
            Some((idx, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(idx, _)| idx)
}

fn header_width(containers: &ContainerConfig, bands: &[Band]) -> f32 {
    if bands.iter().any(|band| band.lane.is_some()) {
        containers.pool_header_width()
    } else {
        0.0
    }
}

/// Grows the pool and its lanes around their content, placing the pool at `top_left`.
fn expand_pool(
    graph: &mut LayoutGraph,
    containers: &ContainerConfig,
    pool: Id,
    bands: &[Band],
    top_left: Point,
) -> Bounds {
    let has_lanes = bands.iter().any(|band| band.lane.is_some());
    let header = header_width(containers, bands);
    let all: Vec<Id> = bands.iter().flat_map(|band| band.members.iter().copied()).collect();
    let content = graph.union_bounds(&all);

    let content_left = top_left.x() + header + containers.pool_margin();
    let dx = content.map_or(0.0, |content| content_left - content.min_x());
    let content_width = content.map_or(0.0, |content| content.width());
    let width = containers
        .pool_min_width()
        .max(content_width + header + 2.0 * containers.pool_margin());
    let inner_margin = if has_lanes {
        containers.lane_margin()
    } else {
        containers.pool_margin()
    };

    let mut y = top_left.y();
    let mut last_lane = None;
    for band in bands {
        let span = graph.union_bounds(&band.members);
        let height = match (band.lane, span) {
            (_, Some(span)) => {
                graph.translate_nodes(
                    &band.members,
                    Point::new(dx, y + inner_margin - span.min_y()),
                );
                let min = if has_lanes {
                    containers.lane_min_height()
                } else {
                    0.0
                };
                min.max(span.height() + 2.0 * inner_margin)
            }
            // Empty lanes are not resized
            (Some(lane), None) => {
                let height = graph.bounds(lane).height();
                if height > 0.0 {
                    height
                } else {
                    containers.lane_min_height()
                }
            }
            (None, None) => 0.0,
        };

        last_lane = band.lane;
        if let Some(lane) = band.lane {
            graph.set_bounds(
                lane,
                Bounds::new_from_top_left(
                    Point::new(top_left.x() + header, y),
                    Size::new(width - header, height),
                ),
            );
        }
        y += height;
    }

    let mut height = y - top_left.y();
    if height < containers.pool_min_height() {
        if let Some(lane) = last_lane {
            let bounds = graph.bounds(lane);
            let grown = bounds.height() + containers.pool_min_height() - height;
            graph.set_bounds(lane, bounds.with_size(Size::new(bounds.width(), grown)));
        }
        height = containers.pool_min_height();
    }

    let frame = Bounds::new_from_top_left(top_left, Size::new(width, height));
    graph.set_bounds(pool, frame);
    frame
}

/// Keeps the existing pool and lane bounds and moves content into its band.
fn fit_into_pool(
    graph: &mut LayoutGraph,
    containers: &ContainerConfig,
    pool: Id,
    bands: &[Band],
) -> Bounds {
    let frame = graph.bounds(pool);
    let has_lanes = bands.iter().any(|band| band.lane.is_some());
    let header = header_width(containers, bands);
    let all: Vec<Id> = bands.iter().flat_map(|band| band.members.iter().copied()).collect();
    let Some(content) = graph.union_bounds(&all) else {
        return frame;
    };
    let dx = frame.min_x() + header + containers.pool_margin() - content.min_x();
    let inner_margin = if has_lanes {
        containers.lane_margin()
    } else {
        containers.pool_margin()
    };

    let mut band_top = frame.min_y();
    for band in bands {
        let top = band.lane.map_or(band_top, |lane| graph.bounds(lane).min_y());
        if let Some(span) = graph.union_bounds(&band.members) {
            graph.translate_nodes(&band.members, Point::new(dx, top + inner_margin - span.min_y()));
        }
        if let Some(lane) = band.lane {
            band_top = graph.bounds(lane).max_y();
        }
    }
    frame
}

/// Grows an expanded subprocess so it encloses its children plus padding and
/// re-attaches its boundary events. Returns true if the bounds changed.
pub fn refit_subprocess(graph: &mut LayoutGraph, subprocess: Id, config: &LayoutConfig) -> bool {
    let children = direct_members(graph, subprocess);
    let Some(content) = graph.union_bounds(&children) else {
        return false;
    };
    let current = graph.bounds(subprocess);
    let fitted = content
        .add_padding(config.spacing().subprocess_padding())
        .merge(&current);
    if fitted == current {
        return false;
    }
    graph.set_bounds(subprocess, fitted);
    attach_boundary_events(graph, subprocess);
    true
}

/// Refits every expanded subprocess, innermost first. Returns the number refitted.
pub fn refit_subprocesses(graph: &mut LayoutGraph, config: &LayoutConfig) -> usize {
    let subprocesses: Vec<Id> = graph
        .containment()
        .post_order()
        .into_iter()
        .filter(|&id| graph.kind(id) == Some(NodeKind::SubProcess))
        .filter(|&id| !graph.containment().children(id).is_empty())
        .collect();
    subprocesses
        .into_iter()
        .filter(|&id| refit_subprocess(graph, id, config))
        .count()
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::{graph::builder::build, model::ElementRecord};

    fn at(x: f32, y: f32, width: f32, height: f32) -> Bounds {
        Bounds::new_from_top_left(Point::new(x, y), Size::new(width, height))
    }

    fn two_lane_pool(lane_height: f32) -> LayoutGraph {
        let mut elements = vec![
            ElementRecord::shape("Pool", "bpmn:Participant", None)
                .with_process_ref("Process")
                .with_bounds(at(0.0, 0.0, 800.0, 2.0 * lane_height)),
            ElementRecord::shape("Process", "bpmn:Process", None),
            ElementRecord::shape("Lane1", "bpmn:Lane", Some("Pool"))
                .with_flow_node_refs(&["T1", "T2", "T3", "T4", "T5"])
                .with_bounds(at(30.0, 0.0, 770.0, lane_height)),
            ElementRecord::shape("Lane2", "bpmn:Lane", Some("Pool"))
                .with_flow_node_refs(&["Other"])
                .with_bounds(at(30.0, lane_height, 770.0, lane_height)),
        ];
        for (idx, id) in ["T1", "T2", "T3", "T4", "T5"].into_iter().enumerate() {
            elements.push(
                ElementRecord::shape(id, "bpmn:Task", Some("Process"))
                    .with_bounds(at(100.0 + 150.0 * idx as f32, 10.0, 100.0, 80.0)),
            );
        }
        elements.push(
            ElementRecord::shape("Other", "bpmn:Task", Some("Process"))
                .with_bounds(at(100.0, 10.0, 100.0, 80.0)),
        );
        build(&elements).expect("valid graph")
    }

    #[test]
    fn test_undersized_lane_reports_expansion_need() {
        let graph = two_lane_pool(100.0);

        let needs = expansion_needs(&graph, &LayoutConfig::default());

        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].lane(), "Lane1");
        assert_eq!(needs[0].elements(), 5);
        assert!(approx_eq!(f32, needs[0].min_height(), 480.0));
        assert!(needs[0].min_height() > needs[0].current_height());
    }

    #[test]
    fn test_expanded_pool_encloses_lanes_and_children() {
        let mut graph = two_lane_pool(100.0);

        resolve_pools(&mut graph, &LayoutConfig::default(), true);

        let pool = graph.bounds(Id::new("Pool"));
        let lane1 = graph.bounds(Id::new("Lane1"));
        let lane2 = graph.bounds(Id::new("Lane2"));
        assert!(pool.contains_bounds(lane1, 0.5));
        assert!(pool.contains_bounds(lane2, 0.5));
        assert!(lane1.max_y() <= lane2.min_y() + 0.5);
        for id in ["T1", "T2", "T3", "T4", "T5"] {
            assert!(lane1.contains_bounds(graph.bounds(Id::new(id)), 0.5), "{id} outside Lane1");
        }
        assert!(lane2.contains_bounds(graph.bounds(Id::new("Other")), 0.5));
        assert!(pool.width() >= 600.0);
    }

    #[test]
    fn test_disabled_expansion_keeps_container_bounds() {
        let mut graph = two_lane_pool(300.0);
        let before = graph.bounds(Id::new("Lane1"));

        resolve_pools(&mut graph, &LayoutConfig::default(), false);

        assert_eq!(graph.bounds(Id::new("Lane1")), before);
        assert_eq!(graph.bounds(Id::new("Pool")), at(0.0, 0.0, 800.0, 600.0));
        let other = graph.bounds(Id::new("Other"));
        assert!(graph.bounds(Id::new("Lane2")).contains_bounds(other, 0.5));
    }

    #[test]
    fn test_empty_lane_keeps_height() {
        let mut graph = build(&[
            ElementRecord::shape("Pool", "bpmn:Participant", None).with_process_ref("Process"),
            ElementRecord::shape("Process", "bpmn:Process", None),
            ElementRecord::shape("Busy", "bpmn:Lane", Some("Pool")).with_flow_node_refs(&["Task"]),
            ElementRecord::shape("Idle", "bpmn:Lane", Some("Pool"))
                .with_bounds(at(0.0, 0.0, 570.0, 175.0)),
            ElementRecord::shape("Task", "bpmn:Task", Some("Process")),
        ])
        .expect("valid graph");

        resolve_pools(&mut graph, &LayoutConfig::default(), true);

        assert!(approx_eq!(f32, graph.bounds(Id::new("Idle")).height(), 175.0));
        assert!(approx_eq!(f32, graph.bounds(Id::new("Busy")).height(), 160.0));
        assert!(expansion_needs(&graph, &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn test_no_participants_is_a_no_op() {
        let mut graph = build(&[ElementRecord::shape("Task", "bpmn:Task", None)]).expect("valid graph");
        let before = graph.bounds(Id::new("Task"));

        assert_eq!(resolve_pools(&mut graph, &LayoutConfig::default(), true), 0);
        assert_eq!(graph.bounds(Id::new("Task")), before);
    }

    #[test]
    fn test_subprocess_refit_encloses_moved_child() {
        let mut graph = build(&[
            ElementRecord::shape("Sub", "bpmn:SubProcess", None).with_bounds(at(0.0, 0.0, 200.0, 150.0)),
            ElementRecord::shape("Inner", "bpmn:Task", Some("Sub")).with_bounds(at(40.0, 300.0, 100.0, 80.0)),
        ])
        .expect("valid graph");

        assert_eq!(refit_subprocesses(&mut graph, &LayoutConfig::default()), 1);
        let sub = graph.bounds(Id::new("Sub"));
        assert!(sub.contains_bounds(graph.bounds(Id::new("Inner")), 0.5));
        assert!(approx_eq!(f32, sub.min_y(), 0.0));
        assert_eq!(refit_subprocesses(&mut graph, &LayoutConfig::default()), 0);
    }
}
