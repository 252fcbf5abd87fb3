//! External labels and their declutter pass.
//!
//! Events, gateways, data objects and data stores carry their name in a label
//! outside the shape, centred below it by default. Named flows carry a label
//! above the midpoint of their waypoints. Labels that overlap a shape or
//! another label are moved to the first free candidate position around their
//! anchor; when no candidate is free the label stays where it is.

use log::{debug, trace};

use bpmn_layout_core::{
    geometry::{Bounds, Point, Size, polyline_midpoint},
    identifier::Id,
};

use crate::{
    config::{LabelConfig, LayoutConfig},
    graph::{LayoutGraph, NodeKind},
};

/// What a label is attached to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelAnchor {
    /// An element label, placed around the shape's bounds.
    Shape(Bounds),
    /// A flow label, placed around a point on the flow.
    Flow(Point),
}

impl LabelAnchor {
    fn bounds(self) -> Bounds {
        match self {
            LabelAnchor::Shape(bounds) => bounds,
            LabelAnchor::Flow(point) => Bounds::new_from_center(point, Size::default()),
        }
    }
}

/// A positioned external label.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    owner: Id,
    anchor: LabelAnchor,
    bounds: Bounds,
}

impl PlacedLabel {
    /// The shape or flow the label belongs to.
    pub fn owner(&self) -> Id {
        self.owner
    }

    pub fn anchor(&self) -> LabelAnchor {
        self.anchor
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub(crate) fn snap(&mut self, grid: f32) {
        self.bounds = self.bounds.snap(grid);
    }
}

/// Result of the label pass.
#[derive(Debug, Clone, Default)]
pub struct LabelLayout {
    labels: Vec<PlacedLabel>,
    moved: usize,
}

impl LabelLayout {
    pub fn labels(&self) -> &[PlacedLabel] {
        &self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut [PlacedLabel] {
        &mut self.labels
    }

    /// Number of labels moved away from their default position.
    pub fn moved(&self) -> usize {
        self.moved
    }
}

/// Estimates the size of a label by greedy word wrapping at the configured
/// wrap width with a fixed character width.
pub fn estimate_label_size(text: &str, config: &LabelConfig) -> Size {
    let mut lines: Vec<usize> = Vec::new();
    let mut current = 0usize;
    let max_chars = ((config.wrap_width() / config.char_width()).floor() as usize).max(1);
    for word in text.split_whitespace() {
        let length = word.chars().count();
        if current == 0 {
            current = length;
        } else if current + 1 + length <= max_chars {
            current += 1 + length;
        } else {
            lines.push(current);
            current = length;
        }
    }
    if current > 0 {
        lines.push(current);
    }

    let widest = lines.iter().copied().max().unwrap_or(0);
    Size::new(
        widest as f32 * config.char_width(),
        lines.len() as f32 * config.line_height(),
    )
}

/// Creates the default label of every named shape with an external label and
/// every named flow, then declutters them.
pub fn place_labels(graph: &LayoutGraph, config: &LayoutConfig) -> LabelLayout {
    let label_config = config.labels();
    let mut labels = initial_labels(graph, label_config);
    let obstacles: Vec<(Id, Bounds)> = graph
        .nodes()
        .filter(|node| !is_container(graph, node.id(), node.kind()))
        .map(|node| (node.id(), node.bounds()))
        .collect();

    let moved = declutter(&mut labels, &obstacles, label_config);
    debug!(labels = labels.len(), moved; "Labels placed");
    LabelLayout { labels, moved }
}

fn is_container(graph: &LayoutGraph, id: Id, kind: NodeKind) -> bool {
    kind.is_swimlane()
        || (kind == NodeKind::SubProcess && !graph.containment().children(id).is_empty())
}

fn initial_labels(graph: &LayoutGraph, config: &LabelConfig) -> Vec<PlacedLabel> {
    let mut labels = Vec::new();
    for node in graph.nodes() {
        let Some(name) = node.name().filter(|name| !name.trim().is_empty()) else {
            continue;
        };
        if !node.kind().has_external_label() {
            continue;
        }
        let anchor = LabelAnchor::Shape(node.bounds());
        let size = estimate_label_size(name, config);
        labels.push(PlacedLabel {
            owner: node.id(),
            anchor,
            bounds: candidates(anchor, size, config.gap())[0],
        });
    }

    for edge in graph.edges() {
        let Some(name) = edge.name().filter(|name| !name.trim().is_empty()) else {
            continue;
        };
        let Some(midpoint) = polyline_midpoint(edge.waypoints()) else {
            continue;
        };
        let anchor = LabelAnchor::Flow(midpoint);
        let size = estimate_label_size(name, config);
        labels.push(PlacedLabel {
            owner: edge.id(),
            anchor,
            bounds: candidates(anchor, size, config.gap())[0],
        });
    }
    labels
}

/// Candidate label positions around an anchor, the default first.
///
/// Shape labels prefer below, above, right, left; flow labels prefer above,
/// below, right, left.
pub fn candidates(anchor: LabelAnchor, size: Size, gap: f32) -> [Bounds; 4] {
    let area = anchor.bounds();
    let center = area.center();
    let below = Point::new(center.x() - size.width() / 2.0, area.max_y() + gap);
    let above = Point::new(
        center.x() - size.width() / 2.0,
        area.min_y() - gap - size.height(),
    );
    let right = Point::new(area.max_x() + gap, center.y() - size.height() / 2.0);
    let left = Point::new(
        area.min_x() - gap - size.width(),
        center.y() - size.height() / 2.0,
    );
    let order = match anchor {
        LabelAnchor::Shape(_) => [below, above, right, left],
        LabelAnchor::Flow(_) => [above, below, right, left],
    };
    order.map(|top_left| Bounds::new_from_top_left(top_left, size))
}

/// Moves overlapping labels to free candidate positions. Returns the number of
/// labels that ended up away from their default position.
pub fn declutter(labels: &mut [PlacedLabel], obstacles: &[(Id, Bounds)], config: &LabelConfig) -> usize {
    let defaults: Vec<Bounds> = labels.iter().map(|label| label.bounds).collect();

    for pass in 0..config.max_passes() {
        let mut changed = false;
        for idx in 0..labels.len() {
            if !is_blocked(labels, idx, labels[idx].bounds, obstacles) {
                continue;
            }
            let size = labels[idx].bounds.to_size();
            let free = candidates(labels[idx].anchor, size, config.gap())
                .into_iter()
                .filter(|candidate| *candidate != labels[idx].bounds)
                .find(|candidate| !is_blocked(labels, idx, *candidate, obstacles));
            if let Some(free) = free {
                trace!(label = labels[idx].owner.to_string(), pass; "Label moved");
                labels[idx].bounds = free;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    labels
        .iter()
        .zip(defaults)
        .filter(|(label, default)| label.bounds != *default)
        .count()
}

/// True if `bounds` for label `idx` overlaps a shape other than its owner or
/// any other label.
fn is_blocked(labels: &[PlacedLabel], idx: usize, bounds: Bounds, obstacles: &[(Id, Bounds)]) -> bool {
    let owner = labels[idx].owner;
    obstacles
        .iter()
        .any(|&(id, obstacle)| id != owner && obstacle.intersects(bounds))
        || labels
            .iter()
            .enumerate()
            .any(|(other, label)| other != idx && label.bounds.intersects(bounds))
}
