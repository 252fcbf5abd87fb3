//! Flattens the BPMN element tree into a [`LayoutGraph`].
//!
//! Parent resolution for a flow node or artifact:
//!
//! 1. an enclosing subprocess always wins;
//! 2. otherwise the first lane (declaration order) that lists the node in its
//!    `flowNodeRefs` owns it;
//! 3. otherwise the participant whose `processRef` names the node's process;
//! 4. otherwise the diagram root.
//!
//! Lanes nested under a parent lane are flattened: only leaf lanes become
//! nodes, hung directly under their participant. Boundary events share the
//! container of their host and are linked to it through `host`, so they are
//! never laid out as descendants of the host.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, warn};

use bpmn_layout_core::{
    geometry::{Bounds, Point},
    identifier::Id,
};

use super::{ContainmentTree, EdgeKind, LayoutEdge, LayoutGraph, LayoutNode, NodeKind};
use crate::{error::GraphBuildError, model::ElementRecord};

/// Element types that carry structure but are not laid out themselves.
const TRANSPARENT_TYPES: [&str; 5] = [
    "Process",
    "Collaboration",
    "LaneSet",
    "DataObject",
    "Definitions",
];

/// Builds a layout graph from an element snapshot in declaration order.
///
/// # Errors
///
/// Returns a [`GraphBuildError`] for dangling connection or parent references,
/// boundary events without a host, duplicate ids and containment cycles.
pub fn build(elements: &[ElementRecord]) -> Result<LayoutGraph, GraphBuildError> {
    let records = index_records(elements)?;
    let lanes = LaneIndex::new(elements, &records)?;
    let resolver = ParentResolver {
        records: &records,
        lanes: &lanes,
        process_owners: process_owners(elements),
    };

    let mut nodes: IndexMap<Id, LayoutNode> = IndexMap::new();
    let mut boundary_events = Vec::new();
    for element in elements {
        if element.is_connection() || EdgeKind::from_bpmn_type(&element.element_type).is_some() {
            continue;
        }
        let Some(kind) = NodeKind::from_bpmn_type(&element.element_type) else {
            if !is_transparent(&element.element_type) {
                warn!(id = element.id.as_str(), element_type = element.element_type.as_str(); "Skipping element of unsupported type");
            }
            continue;
        };
        if kind == NodeKind::Lane && !lanes.is_leaf(&element.id) {
            debug!(id = element.id.as_str(); "Flattening parent lane");
            continue;
        }

        let id = Id::new(&element.id);
        let bounds = element
            .bounds
            .unwrap_or_else(|| Bounds::new_from_top_left(Point::default(), kind.default_size()));
        let parent = match kind {
            NodeKind::Participant => None,
            NodeKind::Lane => lanes.participant_of(&element.id).map(Id::new),
            NodeKind::BoundaryEvent => {
                boundary_events.push(element);
                None
            }
            _ => resolver.resolve(element)?.map(Id::new),
        };
        let node = LayoutNode::new(id, kind, bounds)
            .with_name(element.name.clone())
            .with_parent(parent);
        nodes.insert(id, node);
    }

    for event in boundary_events {
        let host = event
            .attached_to
            .as_deref()
            .map(Id::new)
            .filter(|host| nodes.contains_key(host))
            .ok_or_else(|| GraphBuildError::MissingHost {
                event: event.id.clone(),
                host: event.attached_to.clone().unwrap_or_default(),
            })?;
        let host_parent = nodes.get(&host).and_then(LayoutNode::parent);
        if let Some(node) = nodes.get_mut(&Id::new(&event.id)) {
            node.parent = host_parent;
            node.host = Some(host);
        }
    }

    let entries: Vec<(Id, Option<Id>)> = nodes
        .values()
        .map(|node| (node.id(), node.parent()))
        .collect();
    let containment = ContainmentTree::new(&entries)?;

    let mut edges = Vec::new();
    for element in elements {
        let Some(kind) = EdgeKind::from_bpmn_type(&element.element_type) else {
            continue;
        };
        let source = endpoint(element, element.source.as_deref(), &records)?;
        let target = endpoint(element, element.target.as_deref(), &records)?;
        let (source, target) = (Id::new(source), Id::new(target));
        if !nodes.contains_key(&source) || !nodes.contains_key(&target) {
            warn!(id = element.id.as_str(); "Skipping connection to an element that is not laid out");
            continue;
        }

        let is_default = element
            .source
            .as_deref()
            .and_then(|source| records.get(source))
            .and_then(|source| source.default.as_deref())
            == Some(element.id.as_str());
        let edge = LayoutEdge::new(Id::new(&element.id), kind, source, target)
            .with_name(element.name.clone())
            .with_default(is_default)
            .with_condition(element.condition.is_some());
        edges.push(edge);
    }

    debug!(nodes = nodes.len(), edges = edges.len(); "Layout graph built");
    Ok(LayoutGraph::new(nodes, edges, containment))
}

fn index_records(
    elements: &[ElementRecord],
) -> Result<HashMap<&str, &ElementRecord>, GraphBuildError> {
    let mut records = HashMap::with_capacity(elements.len());
    for element in elements {
        if records.insert(element.id.as_str(), element).is_some() {
            return Err(GraphBuildError::DuplicateId(element.id.clone()));
        }
    }
    Ok(records)
}

fn is_transparent(element_type: &str) -> bool {
    let name = element_type.strip_prefix("bpmn:").unwrap_or(element_type);
    TRANSPARENT_TYPES.contains(&name)
}

fn kind_of(record: &ElementRecord) -> Option<NodeKind> {
    NodeKind::from_bpmn_type(&record.element_type)
}

fn endpoint<'a>(
    element: &ElementRecord,
    reference: Option<&'a str>,
    records: &HashMap<&str, &ElementRecord>,
) -> Result<&'a str, GraphBuildError> {
    match reference {
        Some(reference) if records.contains_key(reference) => Ok(reference),
        reference => Err(GraphBuildError::DanglingReference {
            element: element.id.clone(),
            reference: reference.unwrap_or_default().to_string(),
        }),
    }
}

/// Lane hierarchy and first-wins lane ownership of flow nodes.
struct LaneIndex<'a> {
    leaves: HashSet<&'a str>,
    participants: HashMap<&'a str, &'a str>,
    owners: HashMap<&'a str, &'a str>,
}

impl<'a> LaneIndex<'a> {
    fn new(
        elements: &'a [ElementRecord],
        records: &HashMap<&'a str, &'a ElementRecord>,
    ) -> Result<Self, GraphBuildError> {
        let process_owners = process_owners(elements);
        let lanes: Vec<&ElementRecord> = elements
            .iter()
            .filter(|element| kind_of(element) == Some(NodeKind::Lane))
            .collect();

        let mut child_lanes: HashMap<&str, Vec<&str>> = HashMap::new();
        for lane in &lanes {
            let Some(parent) = lane.parent.as_deref() else {
                continue;
            };
            if records.get(parent).and_then(|p| kind_of(p)) == Some(NodeKind::Lane) {
                child_lanes.entry(parent).or_default().push(lane.id.as_str());
            }
        }
        let leaves: HashSet<&str> = lanes
            .iter()
            .map(|lane| lane.id.as_str())
            .filter(|id| !child_lanes.contains_key(id))
            .collect();

        let mut participants = HashMap::new();
        for lane in &lanes {
            if let Some(participant) = lane_participant(lane, records, &process_owners, lanes.len())? {
                participants.insert(lane.id.as_str(), participant);
            }
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for lane in lanes.iter().filter(|lane| leaves.contains(lane.id.as_str())) {
            for node in &lane.flow_node_refs {
                if !records.contains_key(node.as_str()) {
                    warn!(lane = lane.id.as_str(), node = node.as_str(); "Lane references a missing flow node");
                    continue;
                }
                match owners.get(node.as_str()) {
                    Some(owner) => {
                        warn!(lane = lane.id.as_str(), node = node.as_str(), owner; "Flow node claimed by more than one lane, keeping first");
                    }
                    None => {
                        owners.insert(node.as_str(), lane.id.as_str());
                    }
                }
            }
        }
        // Parent lanes list the nodes of their children; leftovers go to the
        // first leaf below the parent.
        for lane in lanes.iter().filter(|lane| !leaves.contains(lane.id.as_str())) {
            let Some(leaf) = first_leaf(lane.id.as_str(), &child_lanes, &leaves) else {
                continue;
            };
            for node in &lane.flow_node_refs {
                if records.contains_key(node.as_str()) {
                    owners.entry(node.as_str()).or_insert(leaf);
                }
            }
        }

        Ok(Self {
            leaves,
            participants,
            owners,
        })
    }

    fn is_leaf(&self, lane: &str) -> bool {
        self.leaves.contains(lane)
    }

    fn participant_of(&self, lane: &str) -> Option<&'a str> {
        self.participants.get(lane).copied()
    }

    fn owner_of(&self, node: &str) -> Option<&'a str> {
        self.owners.get(node).copied()
    }
}

/// Maps process ids to the participant referencing them.
fn process_owners(elements: &[ElementRecord]) -> HashMap<&str, &str> {
    elements
        .iter()
        .filter(|element| kind_of(element) == Some(NodeKind::Participant))
        .filter_map(|participant| {
            participant
                .process_ref
                .as_deref()
                .map(|process| (process, participant.id.as_str()))
        })
        .collect()
}

fn lane_participant<'a>(
    lane: &'a ElementRecord,
    records: &HashMap<&'a str, &'a ElementRecord>,
    process_owners: &HashMap<&'a str, &'a str>,
    max_depth: usize,
) -> Result<Option<&'a str>, GraphBuildError> {
    let mut current = lane;
    for _ in 0..=max_depth {
        let Some(parent) = current.parent.as_deref() else {
            return Ok(None);
        };
        let record = records
            .get(parent)
            .ok_or_else(|| GraphBuildError::DanglingReference {
                element: current.id.clone(),
                reference: parent.to_string(),
            })?;
        match kind_of(record) {
            Some(NodeKind::Participant) => return Ok(Some(record.id.as_str())),
            Some(NodeKind::Lane) => current = record,
            _ => {
                if let Some(&participant) = process_owners.get(parent) {
                    return Ok(Some(participant));
                }
                current = record;
            }
        }
    }
    Err(GraphBuildError::ContainmentCycle(lane.id.clone()))
}

fn first_leaf<'a>(
    lane: &'a str,
    child_lanes: &HashMap<&'a str, Vec<&'a str>>,
    leaves: &HashSet<&'a str>,
) -> Option<&'a str> {
    let mut current = lane;
    for _ in 0..=child_lanes.len() {
        if leaves.contains(current) {
            return Some(current);
        }
        current = *child_lanes.get(current)?.first()?;
    }
    None
}

struct ParentResolver<'r, 'a> {
    records: &'r HashMap<&'a str, &'a ElementRecord>,
    lanes: &'r LaneIndex<'a>,
    process_owners: HashMap<&'a str, &'a str>,
}

impl<'a> ParentResolver<'_, 'a> {
    /// Resolves the containment parent of a flow node or artifact.
    fn resolve(&self, element: &'a ElementRecord) -> Result<Option<&'a str>, GraphBuildError> {
        let container = self.container_of(element)?;
        let in_subprocess = container
            .and_then(|container| self.records.get(container))
            .and_then(|container| kind_of(container))
            == Some(NodeKind::SubProcess);
        if in_subprocess {
            return Ok(container);
        }
        if let Some(lane) = self.lanes.owner_of(&element.id) {
            return Ok(Some(lane));
        }
        Ok(container)
    }

    /// Walks semantic parents to the nearest subprocess, participant or leaf lane.
    fn container_of(&self, element: &'a ElementRecord) -> Result<Option<&'a str>, GraphBuildError> {
        let mut current = element;
        for _ in 0..=self.records.len() {
            let Some(parent) = current.parent.as_deref() else {
                return Ok(None);
            };
            let record = self
                .records
                .get(parent)
                .ok_or_else(|| GraphBuildError::DanglingReference {
                    element: current.id.clone(),
                    reference: parent.to_string(),
                })?;
            match kind_of(record) {
                Some(NodeKind::SubProcess | NodeKind::Participant) => {
                    return Ok(Some(record.id.as_str()));
                }
                Some(NodeKind::Lane) if self.lanes.is_leaf(parent) => {
                    return Ok(Some(record.id.as_str()));
                }
                Some(NodeKind::Lane) => {
                    return Ok(self.lanes.participant_of(parent));
                }
                _ => {
                    if let Some(&participant) = self.process_owners.get(parent) {
                        return Ok(Some(participant));
                    }
                    current = record;
                }
            }
        }
        Err(GraphBuildError::ContainmentCycle(element.id.clone()))
    }

}
