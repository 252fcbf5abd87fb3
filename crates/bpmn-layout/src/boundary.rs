//! Exception chains of boundary events.
//!
//! The exception chain of a boundary event is the set of nodes reachable from
//! its outgoing flows whose every incoming flow comes from the event or from
//! the chain itself. Each chain is laid out directly below its host, one row
//! per depth, centred on the host and kept within the host's column band so
//! that it never drifts into the column of a neighbouring host.

use std::collections::{BTreeMap, HashSet, VecDeque};

use indexmap::IndexMap;
use log::{debug, trace};

use bpmn_layout_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

use crate::{
    config::LayoutConfig,
    containers::refit_subprocess,
    graph::{LayoutGraph, NodeKind},
};

/// Nodes of one exception chain with their distance from the boundary event.
#[derive(Debug, Clone, Default)]
pub struct ExceptionChain {
    event: Option<Id>,
    members: IndexMap<Id, usize>,
}

impl ExceptionChain {
    pub fn event(&self) -> Option<Id> {
        self.event
    }

    /// Chain members in discovery order.
    pub fn members(&self) -> impl Iterator<Item = Id> + '_ {
        self.members.keys().copied()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of flows between the boundary event and `id`, starting at zero.
    pub fn depth(&self, id: Id) -> Option<usize> {
        self.members.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Collects the exception chain of `event`.
///
/// Only layered nodes that share the host's container are considered, and
/// nodes already in `claimed` are skipped. The walk stops at `max_depth`.
pub fn collect_chain(
    graph: &LayoutGraph,
    event: Id,
    claimed: &HashSet<Id>,
    max_depth: usize,
) -> ExceptionChain {
    let mut chain = ExceptionChain {
        event: Some(event),
        members: IndexMap::new(),
    };
    let Some(host) = graph.node(event).and_then(|node| node.host()) else {
        return chain;
    };
    let container = graph.parent(host);

    let mut queue: VecDeque<(Id, usize)> = graph
        .sequence_outgoing(event)
        .map(|edge| (edge.target(), 0))
        .collect();
    while let Some((id, depth)) = queue.pop_front() {
        if depth > max_depth || id == host || claimed.contains(&id) || chain.contains(id) {
            continue;
        }
        if !graph.kind(id).is_some_and(NodeKind::is_layered) || graph.parent(id) != container {
            continue;
        }
        let exclusive = graph
            .sequence_incoming(id)
            .all(|edge| edge.source() == event || chain.contains(edge.source()));
        if !exclusive {
            // May still be accepted when reached again from a later chain member
            continue;
        }
        chain.members.insert(id, depth);
        queue.extend(graph.sequence_outgoing(id).map(|edge| (edge.target(), depth + 1)));
    }
    chain
}

/// Places every exception chain below its host. Returns the number of nodes placed.
///
/// Scopes are handled innermost first; an expanded subprocess is refitted
/// after its own chains are placed so its outer chains start below it.
pub fn position_chains(graph: &mut LayoutGraph, config: &LayoutConfig) -> usize {
    let max_depth = config.traversal().max_depth();
    let mut claimed: HashSet<Id> = HashSet::new();
    let mut placed = 0;

    for scope in graph.scopes_post_order() {
        let hosts: Vec<Id> = graph
            .nodes()
            .filter(|node| node.kind().is_layered())
            .filter(|node| !graph.boundary_events_of(node.id()).is_empty())
            .filter(|node| graph.scope_of(node.id()) == scope)
            .map(|node| node.id())
            .collect();

        for host in hosts {
            let events = graph.boundary_events_of(host).to_vec();
            for event in events {
                let chain = collect_chain(graph, event, &claimed, max_depth);
                if chain.is_empty() {
                    continue;
                }
                trace!(event = event.to_string(), nodes = chain.len(); "Placing exception chain");
                place_chain(graph, config, host, event, &chain);
                claimed.extend(chain.members());
                placed += chain.len();
            }
        }

        if let Some(container) = scope {
            if graph.kind(container) == Some(NodeKind::SubProcess) {
                refit_subprocess(graph, container, config);
            }
        }
    }

    debug!(nodes = placed; "Exception chains positioned");
    placed
}

/// Lays the chain out below the host: one row per depth, members of the same
/// depth side by side. Rows never leave the host's column band; a depth wider
/// than the band wraps onto further rows.
fn place_chain(
    graph: &mut LayoutGraph,
    config: &LayoutConfig,
    host: Id,
    event: Id,
    chain: &ExceptionChain,
) {
    let spacing = config.spacing();
    let gap = spacing.horizontal_gap();
    let mut depths: BTreeMap<usize, Vec<Id>> = BTreeMap::new();
    for id in chain.members() {
        if let Some(depth) = chain.depth(id) {
            depths.entry(depth).or_default().push(id);
        }
    }

    let host_bounds = graph.bounds(host);
    let (left, right) = column_band(graph, host, chain);
    let mut cursor = host_bounds.max_y().max(graph.bounds(event).max_y()) + spacing.chain_gap();
    for members in depths.values() {
        for line in wrap_members(graph, members, right - left, gap) {
            let sizes: Vec<Size> = line.iter().map(|&id| graph.bounds(id).to_size()).collect();
            let width = sizes.iter().map(|size| size.width()).sum::<f32>()
                + gap * (sizes.len().saturating_sub(1)) as f32;
            let height = sizes.iter().map(|size| size.height()).fold(0.0_f32, f32::max);

            let mut x = (host_bounds.center().x() - width / 2.0)
                .min(right - width)
                .max(left);
            for (&id, size) in line.iter().zip(&sizes) {
                graph.move_to(id, Point::new(x, cursor + (height - size.height()) / 2.0));
                x += size.width() + gap;
            }
            cursor += height + spacing.vertical_gap();
        }
    }

    let members: Vec<Id> = chain.members().collect();
    clear_obstacles(graph, config, host, &members);
}

/// Horizontal band owned by `host`: halfway to the nearest layered node on
/// either side within the host's row.
fn column_band(graph: &LayoutGraph, host: Id, chain: &ExceptionChain) -> (f32, f32) {
    let bounds = graph.bounds(host);
    let scope = graph.scope_of(host);
    let mut left = f32::NEG_INFINITY;
    let mut right = f32::INFINITY;
    for node in graph.nodes() {
        let id = node.id();
        if id == host || chain.contains(id) || !node.kind().is_layered() {
            continue;
        }
        let other = node.bounds();
        if graph.scope_of(id) != scope || other.max_y() <= bounds.min_y() || other.min_y() >= bounds.max_y() {
            continue;
        }
        if other.min_x() >= bounds.max_x() {
            right = right.min((bounds.max_x() + other.min_x()) / 2.0);
        } else if other.max_x() <= bounds.min_x() {
            left = left.max((other.max_x() + bounds.min_x()) / 2.0);
        }
    }
    (left, right)
}

/// Splits one depth into rows no wider than `max_width`, at least one member per row.
fn wrap_members(graph: &LayoutGraph, members: &[Id], max_width: f32, gap: f32) -> Vec<Vec<Id>> {
    let mut lines: Vec<Vec<Id>> = Vec::new();
    let mut width = 0.0_f32;
    for &id in members {
        let member_width = graph.bounds(id).width();
        match lines.last_mut() {
            Some(line) if width + gap + member_width <= max_width => {
                line.push(id);
                width += gap + member_width;
            }
            _ => {
                lines.push(vec![id]);
                width = member_width;
            }
        }
    }
    lines
}

/// Pushes the chain down until it no longer overlaps unrelated nodes near its host.
fn clear_obstacles(graph: &mut LayoutGraph, config: &LayoutConfig, host: Id, members: &[Id]) {
    let scope = graph.scope_of(host);
    let lane = graph.lane_of(host);
    let member_set: HashSet<Id> = members.iter().copied().collect();
    let obstacles: Vec<Bounds> = graph
        .nodes()
        .filter(|node| !member_set.contains(&node.id()))
        .filter(|node| node.host().is_none_or(|host| !member_set.contains(&host)))
        .filter(|node| {
            let kind = node.kind();
            kind.is_layered() || kind.is_artifact() || kind == NodeKind::BoundaryEvent
        })
        .filter(|node| graph.scope_of(node.id()) == scope && graph.lane_of(node.id()) == lane)
        .map(|node| node.bounds())
        .collect();

    for _ in 0..=obstacles.len() {
        let Some(chain_bounds) = graph.union_bounds(members) else {
            return;
        };
        let Some(lowest) = obstacles
            .iter()
            .filter(|obstacle| obstacle.intersects(chain_bounds))
            .map(|obstacle| obstacle.max_y())
            .reduce(f32::max)
        else {
            return;
        };
        let dy = lowest + config.spacing().chain_gap() - chain_bounds.min_y();
        graph.translate_nodes(members, Point::new(0.0, dy));
    }
}
