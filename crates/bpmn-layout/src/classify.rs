//! Happy-path classification of split nodes.
//!
//! Every node with two or more outgoing sequence flows gets exactly one
//! on-path edge; the remaining outgoing flows are off-path. Gateways follow
//! the BPMN rules below, activities with conditional flows are treated alike.
//!
//! - With a default flow, the on-path edge is another outgoing edge that
//!   carries a condition (the default is the fallback branch).
//! - Without a default, it is the first conditioned edge in declaration order,
//!   or the first outgoing edge if none has a condition.
//! - Parallel gateways have no path semantics; the first outgoing edge is
//!   used for ordering and the result is flagged as parallel.
//!
//! Candidates whose branch loops back to the split or exceeds the traversal
//! depth are demoted behind branches that terminate.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, trace};

use bpmn_layout_core::identifier::Id;

use crate::{
    config::TraversalConfig,
    graph::{GatewayKind, LayoutEdge, LayoutGraph, NodeKind},
};

/// How a branch ends when followed from a split node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTrace {
    /// Every path ends without revisiting the split node.
    Terminates,
    /// Some path returns to the split node.
    LoopsBack,
    /// The depth cap was hit before the branch could be classified.
    Unknown,
}

/// On-path and off-path outgoing edges of one split node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitBranches {
    on_path: Id,
    off_path: Vec<Id>,
    parallel: bool,
}

impl SplitBranches {
    /// The edge kept on the primary row.
    pub fn on_path(&self) -> Id {
        self.on_path
    }

    /// The demoted edges, in declaration order.
    pub fn off_path(&self) -> &[Id] {
        &self.off_path
    }

    /// True for parallel gateways, where all branches are equally on-path.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

/// Mapping from split node to its branch classification.
///
/// Computed once per layout run.
#[derive(Debug, Clone, Default)]
pub struct BranchClassification {
    splits: IndexMap<Id, SplitBranches>,
    edge_roles: HashMap<Id, bool>,
}

impl BranchClassification {
    /// Classification of a split node, if it is one.
    pub fn get(&self, split: Id) -> Option<&SplitBranches> {
        self.splits.get(&split)
    }

    /// Iterates over split nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Id, &SplitBranches)> {
        self.splits.iter().map(|(&id, branches)| (id, branches))
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// True if the edge is the on-path edge of its split node.
    pub fn is_on_path(&self, edge: Id) -> bool {
        self.edge_roles.get(&edge) == Some(&true)
    }

    /// True if the edge leaves a split node but is not its on-path edge.
    pub fn is_off_path(&self, edge: Id) -> bool {
        self.edge_roles.get(&edge) == Some(&false)
    }

    /// Solver priority of an edge: on-path highest, off-path lowest.
    pub fn priority(&self, edge: Id) -> u32 {
        match self.edge_roles.get(&edge) {
            Some(true) => 2,
            None => 1,
            Some(false) => 0,
        }
    }
}

/// Classifies every split node of the graph.
pub fn classify(graph: &LayoutGraph, config: &TraversalConfig) -> BranchClassification {
    let mut classification = BranchClassification::default();

    for node in graph.nodes() {
        let outgoing: Vec<&LayoutEdge> = graph.sequence_outgoing(node.id()).collect();
        if outgoing.len() < 2 {
            continue;
        }

        let parallel = node.kind() == NodeKind::Gateway(GatewayKind::Parallel);
        let on_path = if parallel {
            outgoing[0].id()
        } else {
            pick_on_path(graph, node.id(), &outgoing, config.max_depth())
        };
        let off_path: Vec<Id> = outgoing
            .iter()
            .map(|edge| edge.id())
            .filter(|&edge| edge != on_path)
            .collect();

        trace!(split = node.id().to_string(), on_path = on_path.to_string(), off_path = off_path.len(); "Classified split");
        classification.edge_roles.insert(on_path, true);
        for &edge in &off_path {
            classification.edge_roles.insert(edge, false);
        }
        classification.splits.insert(
            node.id(),
            SplitBranches {
                on_path,
                off_path,
                parallel,
            },
        );
    }

    debug!(splits = classification.len(); "Happy path classified");
    classification
}

fn pick_on_path(graph: &LayoutGraph, split: Id, outgoing: &[&LayoutEdge], max_depth: usize) -> Id {
    // Preference order: conditioned non-default, other non-default, default.
    let mut candidates: Vec<&LayoutEdge> = Vec::with_capacity(outgoing.len());
    candidates.extend(outgoing.iter().filter(|e| !e.is_default() && e.has_condition()));
    candidates.extend(outgoing.iter().filter(|e| !e.is_default() && !e.has_condition()));
    candidates.extend(outgoing.iter().filter(|e| e.is_default()));

    candidates
        .iter()
        .find(|edge| trace_branch(graph, split, edge.target(), max_depth) == BranchTrace::Terminates)
        .or_else(|| candidates.first())
        .map(|edge| edge.id())
        .unwrap_or_else(|| outgoing[0].id())
}

/// Follows sequence flows from `start` with a visited set and depth cap.
pub fn trace_branch(graph: &LayoutGraph, split: Id, start: Id, max_depth: usize) -> BranchTrace {
    if start == split {
        return BranchTrace::LoopsBack;
    }

    let mut visited: HashSet<Id> = HashSet::from([start]);
    let mut stack = vec![(start, 0usize)];
    let mut truncated = false;
    while let Some((node, depth)) = stack.pop() {
        if depth >= max_depth {
            truncated = true;
            continue;
        }
        for edge in graph.sequence_outgoing(node) {
            let next = edge.target();
            if next == split {
                return BranchTrace::LoopsBack;
            }
            if visited.insert(next) {
                stack.push((next, depth + 1));
            }
        }
    }

    if truncated {
        BranchTrace::Unknown
    } else {
        BranchTrace::Terminates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{graph::builder::build, model::ElementRecord};

    fn node(id: &str, element_type: &str) -> ElementRecord {
        ElementRecord::shape(id, element_type, None)
    }

    fn flow(id: &str, source: &str, target: &str) -> ElementRecord {
        ElementRecord::connection(id, "bpmn:SequenceFlow", source, target)
    }

    fn classify_default(elements: &[ElementRecord]) -> BranchClassification {
        let graph = build(elements).expect("valid graph");
        classify(&graph, &TraversalConfig::default())
    }

    #[test]
    fn test_default_flow_is_off_path() {
        let classification = classify_default(&[
            node("Gw", "bpmn:ExclusiveGateway").with_default("ToB"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            flow("ToB", "Gw", "B"),
            flow("ToA", "Gw", "A").with_condition("${valid}"),
        ]);

        let branches = classification.get(Id::new("Gw")).expect("split classified");
        assert_eq!(branches.on_path(), Id::new("ToA"));
        assert_eq!(branches.off_path(), &[Id::new("ToB")]);
        assert!(classification.is_off_path(Id::new("ToB")));
        assert_eq!(classification.priority(Id::new("ToA")), 2);
    }

    #[test]
    fn test_first_conditioned_edge_wins_without_default() {
        let classification = classify_default(&[
            node("Gw", "bpmn:InclusiveGateway"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            node("C", "bpmn:Task"),
            flow("ToA", "Gw", "A"),
            flow("ToB", "Gw", "B").with_condition("b"),
            flow("ToC", "Gw", "C").with_condition("c"),
        ]);

        let branches = classification.get(Id::new("Gw")).expect("split classified");
        assert_eq!(branches.on_path(), Id::new("ToB"));
        assert_eq!(branches.off_path(), &[Id::new("ToA"), Id::new("ToC")]);
    }

    #[test]
    fn test_first_edge_without_conditions() {
        let classification = classify_default(&[
            node("Gw", "bpmn:EventBasedGateway"),
            node("A", "bpmn:IntermediateCatchEvent"),
            node("B", "bpmn:IntermediateCatchEvent"),
            flow("ToA", "Gw", "A"),
            flow("ToB", "Gw", "B"),
        ]);

        assert_eq!(
            classification.get(Id::new("Gw")).map(SplitBranches::on_path),
            Some(Id::new("ToA"))
        );
    }

    #[test]
    fn test_parallel_gateway_uses_first_outgoing() {
        let classification = classify_default(&[
            node("Fork", "bpmn:ParallelGateway"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            flow("ToB", "Fork", "B").with_condition("ignored"),
            flow("ToA", "Fork", "A"),
        ]);

        let branches = classification.get(Id::new("Fork")).expect("split classified");
        assert!(branches.is_parallel());
        assert_eq!(branches.on_path(), Id::new("ToB"));
    }

    #[test]
    fn test_loop_back_branch_is_demoted() {
        let classification = classify_default(&[
            node("Work", "bpmn:Task"),
            node("Check", "bpmn:ExclusiveGateway"),
            node("Done", "bpmn:EndEvent"),
            flow("In", "Work", "Check"),
            flow("Retry", "Check", "Work").with_condition("retry"),
            flow("Finish", "Check", "Done").with_condition("done"),
        ]);

        let branches = classification.get(Id::new("Check")).expect("split classified");
        assert_eq!(branches.on_path(), Id::new("Finish"));
        assert_eq!(branches.off_path(), &[Id::new("Retry")]);
    }

    #[test]
    fn test_trace_is_bounded_on_cycles() {
        let graph = build(&[
            node("Split", "bpmn:ExclusiveGateway"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            flow("F1", "Split", "A"),
            flow("F2", "A", "B"),
            flow("F3", "B", "A"),
        ])
        .expect("valid graph");

        assert_eq!(
            trace_branch(&graph, Id::new("Split"), Id::new("A"), 25),
            BranchTrace::Terminates
        );
        assert_eq!(
            trace_branch(&graph, Id::new("Split"), Id::new("A"), 1),
            BranchTrace::Unknown
        );
    }
}
