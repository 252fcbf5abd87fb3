//! The layout graph: typed nodes, typed edges and the containment tree.
//!
//! A [`LayoutGraph`] is built fresh for every layout invocation from the
//! element snapshot of a [`DiagramModel`](crate::model::DiagramModel). All
//! pipeline stages mutate node bounds and edge waypoints in place; the graph is
//! discarded once geometry has been written back to the model.
//!
//! The flow graph (sequence, message and association edges) may be cyclic. The
//! containment tree never is; [`builder::build`] rejects containment cycles.

pub mod builder;
mod containment;

pub use containment::ContainmentTree;

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use bpmn_layout_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

/// Flavour of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayKind {
    Exclusive,
    Inclusive,
    Parallel,
    EventBased,
    Complex,
}

/// Closed set of node kinds, resolved once from BPMN type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    StartEvent,
    EndEvent,
    IntermediateEvent,
    BoundaryEvent,
    Task,
    SubProcess,
    Gateway(GatewayKind),
    Participant,
    Lane,
    DataObject,
    DataStore,
    TextAnnotation,
}

impl NodeKind {
    /// Maps a BPMN type name (with or without the `bpmn:` prefix) to a node kind.
    ///
    /// Returns `None` for connections, transparent containers such as
    /// processes, and element types the engine does not lay out.
    pub fn from_bpmn_type(element_type: &str) -> Option<Self> {
        let kind = match strip_prefix(element_type) {
            "StartEvent" => Self::StartEvent,
            "EndEvent" => Self::EndEvent,
            "IntermediateCatchEvent" | "IntermediateThrowEvent" => Self::IntermediateEvent,
            "BoundaryEvent" => Self::BoundaryEvent,
            "Task" | "UserTask" | "ServiceTask" | "ScriptTask" | "ManualTask"
            | "BusinessRuleTask" | "SendTask" | "ReceiveTask" | "CallActivity" => Self::Task,
            "SubProcess" | "Transaction" | "AdHocSubProcess" => Self::SubProcess,
            "ExclusiveGateway" => Self::Gateway(GatewayKind::Exclusive),
            "InclusiveGateway" => Self::Gateway(GatewayKind::Inclusive),
            "ParallelGateway" => Self::Gateway(GatewayKind::Parallel),
            "EventBasedGateway" => Self::Gateway(GatewayKind::EventBased),
            "ComplexGateway" => Self::Gateway(GatewayKind::Complex),
            "Participant" => Self::Participant,
            "Lane" => Self::Lane,
            "DataObjectReference" => Self::DataObject,
            "DataStoreReference" => Self::DataStore,
            "TextAnnotation" => Self::TextAnnotation,
            _ => return None,
        };
        Some(kind)
    }

    /// Default shape size used when an element has no DI bounds.
    pub fn default_size(self) -> Size {
        match self {
            Self::StartEvent | Self::EndEvent | Self::IntermediateEvent | Self::BoundaryEvent => {
                Size::new(36.0, 36.0)
            }
            Self::Task => Size::new(100.0, 80.0),
            Self::SubProcess => Size::new(350.0, 200.0),
            Self::Gateway(_) => Size::new(50.0, 50.0),
            Self::Participant => Size::new(600.0, 250.0),
            Self::Lane => Size::new(570.0, 120.0),
            Self::DataObject => Size::new(36.0, 50.0),
            Self::DataStore => Size::new(50.0, 50.0),
            Self::TextAnnotation => Size::new(100.0, 30.0),
        }
    }

    pub fn is_gateway(self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    pub fn is_event(self) -> bool {
        matches!(
            self,
            Self::StartEvent | Self::EndEvent | Self::IntermediateEvent | Self::BoundaryEvent
        )
    }

    /// Data objects, data stores and text annotations.
    pub fn is_artifact(self) -> bool {
        matches!(self, Self::DataObject | Self::DataStore | Self::TextAnnotation)
    }

    /// Pools and lanes.
    pub fn is_swimlane(self) -> bool {
        matches!(self, Self::Participant | Self::Lane)
    }

    /// Nodes handed to the layered solver: flow nodes other than boundary events.
    pub fn is_layered(self) -> bool {
        !self.is_artifact() && !self.is_swimlane() && self != Self::BoundaryEvent
    }

    /// Nodes whose name is drawn as a free-floating label next to the shape.
    pub fn has_external_label(self) -> bool {
        self.is_event() || self.is_gateway() || matches!(self, Self::DataObject | Self::DataStore)
    }
}

/// Closed set of connection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    SequenceFlow,
    MessageFlow,
    Association,
}

impl EdgeKind {
    /// Maps a BPMN connection type name to an edge kind.
    pub fn from_bpmn_type(element_type: &str) -> Option<Self> {
        match strip_prefix(element_type) {
            "SequenceFlow" => Some(Self::SequenceFlow),
            "MessageFlow" => Some(Self::MessageFlow),
            "Association" | "DataInputAssociation" | "DataOutputAssociation" => {
                Some(Self::Association)
            }
            _ => None,
        }
    }
}

fn strip_prefix(element_type: &str) -> &str {
    element_type.strip_prefix("bpmn:").unwrap_or(element_type)
}

/// A node of the layout graph.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    id: Id,
    kind: NodeKind,
    name: Option<String>,
    bounds: Bounds,
    parent: Option<Id>,
    host: Option<Id>,
}

impl LayoutNode {
    pub fn new(id: Id, kind: NodeKind, bounds: Bounds) -> Self {
        Self {
            id,
            kind,
            name: None,
            bounds,
            parent: None,
            host: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_parent(mut self, parent: Option<Id>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_host(mut self, host: Option<Id>) -> Self {
        self.host = host;
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Containment parent; `None` for nodes at the diagram root.
    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// Host activity of a boundary event. Attachment is not containment.
    pub fn host(&self) -> Option<Id> {
        self.host
    }
}

/// An edge of the layout graph.
#[derive(Debug, Clone)]
pub struct LayoutEdge {
    id: Id,
    kind: EdgeKind,
    source: Id,
    target: Id,
    name: Option<String>,
    is_default: bool,
    has_condition: bool,
    waypoints: Vec<Point>,
}

impl LayoutEdge {
    pub fn new(id: Id, kind: EdgeKind, source: Id, target: Id) -> Self {
        Self {
            id,
            kind,
            source,
            target,
            name: None,
            is_default: false,
            has_condition: false,
            waypoints: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_condition(mut self, has_condition: bool) -> Self {
        self.has_condition = has_condition;
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn source(&self) -> Id {
        self.source
    }

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True if the edge is the default flow of its source.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// True if the edge carries a condition expression.
    pub fn has_condition(&self) -> bool {
        self.has_condition
    }

    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    pub fn is_sequence_flow(&self) -> bool {
        self.kind == EdgeKind::SequenceFlow
    }
}

/// Directed multigraph of layout nodes with a containment tree on top.
///
/// Nodes and edges keep declaration order, which several tie-breaks rely on.
#[derive(Debug, Clone)]
pub struct LayoutGraph {
    nodes: IndexMap<Id, LayoutNode>,
    edges: Vec<LayoutEdge>,
    edge_index: HashMap<Id, usize>,
    incoming: HashMap<Id, Vec<usize>>,
    outgoing: HashMap<Id, Vec<usize>>,
    containment: ContainmentTree,
    hosted: HashMap<Id, Vec<Id>>,
}

impl LayoutGraph {
    /// Assembles a graph from already validated parts.
    pub(crate) fn new(
        nodes: IndexMap<Id, LayoutNode>,
        edges: Vec<LayoutEdge>,
        containment: ContainmentTree,
    ) -> Self {
        let mut edge_index = HashMap::new();
        let mut incoming: HashMap<Id, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<Id, Vec<usize>> = HashMap::new();
        for (idx, edge) in edges.iter().enumerate() {
            edge_index.insert(edge.id, idx);
            outgoing.entry(edge.source).or_default().push(idx);
            incoming.entry(edge.target).or_default().push(idx);
        }

        let mut hosted: HashMap<Id, Vec<Id>> = HashMap::new();
        for node in nodes.values() {
            if let Some(host) = node.host {
                hosted.entry(host).or_default().push(node.id);
            }
        }

        Self {
            nodes,
            edges,
            edge_index,
            incoming,
            outgoing,
            containment,
            hosted,
        }
    }

    pub fn node(&self, id: Id) -> Option<&LayoutNode> {
        self.nodes.get(&id)
    }

    /// Returns an iterator over all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the kind of a node, if it exists.
    pub fn kind(&self, id: Id) -> Option<NodeKind> {
        self.nodes.get(&id).map(|node| node.kind)
    }

    /// Returns the bounds of a node, or empty bounds at the origin if it is missing.
    pub fn bounds(&self, id: Id) -> Bounds {
        self.nodes
            .get(&id)
            .map(|node| node.bounds)
            .unwrap_or_default()
    }

    /// Replaces the bounds of a single node without moving anything else.
    pub fn set_bounds(&mut self, id: Id, bounds: Bounds) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.bounds = bounds;
        }
    }

    pub fn edge(&self, id: Id) -> Option<&LayoutEdge> {
        self.edge_index.get(&id).map(|&idx| &self.edges[idx])
    }

    /// Returns an iterator over all edges in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = &LayoutEdge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn set_waypoints(&mut self, id: Id, waypoints: Vec<Point>) {
        if let Some(&idx) = self.edge_index.get(&id) {
            self.edges[idx].waypoints = waypoints;
        }
    }

    /// Returns the edges leaving a node, in declaration order.
    pub fn outgoing(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Returns the edges entering a node, in declaration order.
    pub fn incoming(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Outgoing sequence flows of a node.
    pub fn sequence_outgoing(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.outgoing(id).filter(|edge| edge.is_sequence_flow())
    }

    /// Incoming sequence flows of a node.
    pub fn sequence_incoming(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.incoming(id).filter(|edge| edge.is_sequence_flow())
    }

    pub fn containment(&self) -> &ContainmentTree {
        &self.containment
    }

    /// Containment parent of a node.
    pub fn parent(&self, id: Id) -> Option<Id> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Boundary events attached to `host`, in declaration order.
    pub fn boundary_events_of(&self, host: Id) -> &[Id] {
        self.hosted.get(&host).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the lane a node is laid out in, if any.
    pub fn lane_of(&self, id: Id) -> Option<Id> {
        self.ancestor_where(id, |kind| kind == NodeKind::Lane)
    }

    /// Returns the participant (pool) a node belongs to, if any.
    pub fn pool_of(&self, id: Id) -> Option<Id> {
        self.ancestor_where(id, |kind| kind == NodeKind::Participant)
    }

    /// Returns the layout scope of a node: the nearest enclosing participant or
    /// subprocess, or `None` for the diagram root. Lanes are transparent.
    pub fn scope_of(&self, id: Id) -> Option<Id> {
        self.ancestor_where(id, |kind| {
            matches!(kind, NodeKind::Participant | NodeKind::SubProcess)
        })
    }

    fn ancestor_where(&self, id: Id, predicate: impl Fn(NodeKind) -> bool) -> Option<Id> {
        let mut current = self.parent(id);
        // The containment tree is acyclic, the bound only guards against misuse.
        for _ in 0..self.nodes.len() {
            let ancestor = current?;
            if self.kind(ancestor).is_some_and(&predicate) {
                return Some(ancestor);
            }
            current = self.parent(ancestor);
        }
        None
    }

    /// Returns all containment descendants of a node in breadth-first order.
    pub fn descendants(&self, id: Id) -> Vec<Id> {
        let mut result = Vec::new();
        let mut queue: VecDeque<Id> = self.containment.children(id).iter().copied().collect();
        while let Some(child) = queue.pop_front() {
            result.push(child);
            queue.extend(self.containment.children(child).iter().copied());
        }
        result
    }

    /// Moves a node together with its containment descendants and every
    /// boundary event attached to any of them.
    pub fn translate_tree(&mut self, id: Id, offset: Point) {
        if offset.x() == 0.0 && offset.y() == 0.0 {
            return;
        }
        let mut moved: HashSet<Id> = HashSet::new();
        let mut members = vec![id];
        members.extend(self.descendants(id));
        for member in members {
            self.translate_with_attachments(member, offset, &mut moved);
        }
    }

    /// Moves a set of nodes, each with its attached boundary events, without
    /// following containment.
    pub fn translate_nodes(&mut self, ids: &[Id], offset: Point) {
        let mut moved: HashSet<Id> = HashSet::new();
        for &id in ids {
            if self.containment.children(id).is_empty() {
                self.translate_with_attachments(id, offset, &mut moved);
            } else {
                for member in std::iter::once(id).chain(self.descendants(id)) {
                    self.translate_with_attachments(member, offset, &mut moved);
                }
            }
        }
    }

    fn translate_with_attachments(&mut self, id: Id, offset: Point, moved: &mut HashSet<Id>) {
        let attached = self.boundary_events_of(id).to_vec();
        for member in std::iter::once(id).chain(attached) {
            if !moved.insert(member) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&member) {
                node.bounds = node.bounds.translate(offset);
            }
        }
    }

    /// Moves a node (and everything it carries) so its top-left corner is `top_left`.
    pub fn move_to(&mut self, id: Id, top_left: Point) {
        let current = self.bounds(id).min_point();
        self.translate_tree(id, top_left.sub_point(current));
    }

    /// Returns the union of the bounds of `ids` and their attached boundary
    /// events, or `None` if `ids` is empty.
    pub fn union_bounds(&self, ids: &[Id]) -> Option<Bounds> {
        ids.iter()
            .flat_map(|&id| std::iter::once(id).chain(self.boundary_events_of(id).iter().copied()))
            .filter_map(|id| self.node(id).map(LayoutNode::bounds))
            .reduce(|acc, bounds| acc.merge(&bounds))
    }

    /// Leaf lanes of a participant in declaration order.
    pub fn lanes_of(&self, participant: Id) -> Vec<Id> {
        self.containment
            .children(participant)
            .iter()
            .copied()
            .filter(|&child| self.kind(child) == Some(NodeKind::Lane))
            .collect()
    }

    /// Participants in declaration order.
    pub fn participants(&self) -> Vec<Id> {
        self.nodes
            .values()
            .filter(|node| node.kind == NodeKind::Participant)
            .map(|node| node.id)
            .collect()
    }

    /// Nodes handed to the layered solver for a scope, in declaration order.
    pub fn scope_members(&self, scope: Option<Id>) -> Vec<Id> {
        self.nodes
            .values()
            .filter(|node| node.kind.is_layered() && self.scope_of(node.id) == scope)
            .map(|node| node.id)
            .collect()
    }

    /// Layout scopes in containment post-order: inner subprocesses first, the
    /// diagram root (`None`) last.
    pub fn scopes_post_order(&self) -> Vec<Option<Id>> {
        let mut scopes: Vec<Option<Id>> = self
            .containment
            .post_order()
            .into_iter()
            .filter(|&id| match self.kind(id) {
                Some(NodeKind::Participant) => true,
                Some(NodeKind::SubProcess) => !self.containment.children(id).is_empty(),
                _ => false,
            })
            .map(Some)
            .collect();
        scopes.push(None);
        scopes
    }
}
