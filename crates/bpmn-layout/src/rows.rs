//! Branch row ordering.
//!
//! Rows are assigned fresh for every scope, keeping the solver's columns:
//!
//! - The main chain from each start node (start events first, in declaration
//!   order) follows on-path successors and is pinned to one row.
//! - Off-path branch `k` of a split goes to row `split_row + 1 + k`, moving
//!   further down while that row is occupied within the branch's column span.
//!   Splits are processed breadth-first.
//! - Nodes reachable only from boundary events are processed last; the
//!   exception-chain stage relocates them afterwards.
//! - A bounded repair loop shifts an off-path branch (with its nested
//!   branches) below the on-path target whenever the on-path target ended up
//!   on a lower row.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, trace};

use bpmn_layout_core::identifier::Id;

use crate::{
    classify::BranchClassification,
    config::TraversalConfig,
    graph::{LayoutGraph, NodeKind},
    placement::{GridCell, Placement, compact},
};

/// Assigns final rows to every layered node and returns the updated cells.
pub fn order_rows(
    graph: &LayoutGraph,
    classification: &BranchClassification,
    placement: &Placement,
    config: &TraversalConfig,
) -> HashMap<Id, GridCell> {
    let mut cells = HashMap::with_capacity(placement.cells().len());
    for scope in placement.scopes() {
        let mut ordering = RowOrdering::new(graph, classification, placement, scope.members());
        ordering.assign();
        ordering.repair(config.max_row_passes());
        cells.extend(ordering.into_cells());
    }
    debug!(nodes = cells.len(); "Branch rows ordered");
    cells
}

/// A run of nodes pinned together below the split that produced it.
#[derive(Debug)]
struct Branch {
    head: Id,
    parent: Option<usize>,
    nodes: Vec<Id>,
}

struct RowOrdering<'a> {
    graph: &'a LayoutGraph,
    classification: &'a BranchClassification,
    members: &'a [Id],
    member_set: HashSet<Id>,
    columns: HashMap<Id, usize>,
    rows: HashMap<Id, usize>,
    branches: Vec<Branch>,
    branch_of: HashMap<Id, usize>,
    queue: VecDeque<Id>,
}

impl<'a> RowOrdering<'a> {
    fn new(
        graph: &'a LayoutGraph,
        classification: &'a BranchClassification,
        placement: &Placement,
        members: &'a [Id],
    ) -> Self {
        let columns = members
            .iter()
            .map(|&id| (id, placement.column(id).unwrap_or_default()))
            .collect();
        Self {
            graph,
            classification,
            members,
            member_set: members.iter().copied().collect(),
            columns,
            rows: HashMap::new(),
            branches: Vec::new(),
            branch_of: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn column(&self, id: Id) -> usize {
        self.columns.get(&id).copied().unwrap_or_default()
    }

    fn is_pinned(&self, id: Id) -> bool {
        self.rows.contains_key(&id)
    }

    fn assign(&mut self) {
        for start in self.starts() {
            if !self.is_pinned(start) {
                self.place_chain(start, 0, None);
                self.drain_splits();
            }
        }

        let deferred = self.boundary_only_nodes();
        let (later, fresh): (Vec<Id>, Vec<Id>) = self
            .members
            .iter()
            .copied()
            .filter(|&id| !self.is_pinned(id))
            .partition(|id| deferred.contains(id));
        for id in fresh.into_iter().chain(later) {
            if !self.is_pinned(id) {
                let below = self.rows.values().max().map_or(0, |row| row + 1);
                self.place_chain(id, below, None);
                self.drain_splits();
            }
        }
    }

    /// Start events first, then members without incoming sequence flows.
    fn starts(&self) -> Vec<Id> {
        let mut starts: Vec<Id> = self
            .members
            .iter()
            .copied()
            .filter(|&id| self.graph.kind(id) == Some(NodeKind::StartEvent))
            .collect();
        for &id in self.members {
            if !starts.contains(&id) && self.graph.sequence_incoming(id).next().is_none() {
                starts.push(id);
            }
        }
        starts
    }

    /// Unpinned members reachable from a boundary event through unpinned members.
    fn boundary_only_nodes(&self) -> HashSet<Id> {
        let mut reached = HashSet::new();
        let mut queue: VecDeque<Id> = self
            .graph
            .edges()
            .filter(|edge| {
                edge.is_sequence_flow()
                    && self.graph.kind(edge.source()) == Some(NodeKind::BoundaryEvent)
            })
            .map(|edge| edge.target())
            .collect();
        while let Some(id) = queue.pop_front() {
            if !self.member_set.contains(&id) || self.is_pinned(id) || !reached.insert(id) {
                continue;
            }
            queue.extend(self.graph.sequence_outgoing(id).map(|edge| edge.target()));
        }
        reached
    }

    /// On-path successor of a node inside the scope.
    fn primary_successor(&self, id: Id) -> Option<Id> {
        if let Some(branches) = self.classification.get(id) {
            return self
                .graph
                .edge(branches.on_path())
                .map(|edge| edge.target())
                .filter(|target| self.member_set.contains(target));
        }
        self.graph
            .sequence_outgoing(id)
            .map(|edge| edge.target())
            .find(|target| self.member_set.contains(target))
    }

    /// Follows primary successors from `start` until a pinned node, a
    /// non-forward step or the end of the chain.
    fn collect_chain(&self, start: Id) -> Vec<Id> {
        let mut chain = Vec::new();
        let mut current = start;
        for _ in 0..self.members.len() {
            if self.is_pinned(current) || chain.contains(&current) {
                break;
            }
            chain.push(current);
            match self.primary_successor(current) {
                Some(next) if self.column(next) > self.column(current) => current = next,
                _ => break,
            }
        }
        chain
    }

    fn span(&self, nodes: &[Id]) -> (usize, usize) {
        let columns = nodes.iter().map(|&id| self.column(id));
        let min = columns.clone().min().unwrap_or_default();
        let max = columns.max().unwrap_or_default();
        (min, max)
    }

    /// True if a pinned node outside `ignore` sits on `row` within `span`.
    fn is_occupied(&self, row: usize, span: (usize, usize), ignore: &HashSet<Id>) -> bool {
        self.rows.iter().any(|(id, &pinned_row)| {
            pinned_row == row
                && !ignore.contains(id)
                && (span.0..=span.1).contains(&self.column(*id))
        })
    }

    fn free_row(&self, nodes: &[Id], from: usize) -> usize {
        let span = self.span(nodes);
        let ignore = HashSet::new();
        let mut row = from;
        while self.is_occupied(row, span, &ignore) {
            row += 1;
        }
        row
    }

    fn place_chain(&mut self, start: Id, from_row: usize, parent: Option<usize>) -> Option<usize> {
        let chain = self.collect_chain(start);
        if chain.is_empty() {
            return None;
        }
        let row = self.free_row(&chain, from_row);
        let branch = self.branches.len();
        for &id in &chain {
            trace!(id = id.to_string(), row; "Pinned row");
            self.rows.insert(id, row);
            self.branch_of.insert(id, branch);
            if self.classification.get(id).is_some() {
                self.queue.push_back(id);
            }
        }
        self.branches.push(Branch {
            head: start,
            parent,
            nodes: chain,
        });
        Some(branch)
    }

    fn drain_splits(&mut self) {
        let classification = self.classification;
        while let Some(split) = self.queue.pop_front() {
            let Some(branches) = classification.get(split) else {
                continue;
            };
            let split_row = self.rows.get(&split).copied().unwrap_or_default();
            let parent = self.branch_of.get(&split).copied();

            let mut k = 0;
            for &edge in branches.off_path() {
                let Some(target) = self.graph.edge(edge).map(|edge| edge.target()) else {
                    continue;
                };
                if !self.member_set.contains(&target) || self.is_pinned(target) {
                    continue;
                }
                if self.place_chain(target, split_row + 1 + k, parent).is_some() {
                    k += 1;
                }
            }

            // An on-path target behind the split is not part of the main chain.
            let on_target = self
                .graph
                .edge(branches.on_path())
                .map(|edge| edge.target())
                .filter(|target| self.member_set.contains(target) && !self.is_pinned(*target));
            if let Some(target) = on_target {
                self.place_chain(target, split_row, parent);
            }
        }
    }

    /// Branch indices of `branch` and every branch nested below it.
    fn branch_family(&self, branch: usize) -> Vec<usize> {
        let mut family = vec![branch];
        let mut idx = 0;
        while idx < family.len() {
            let current = family[idx];
            family.extend(
                self.branches
                    .iter()
                    .enumerate()
                    .filter(|(_, candidate)| candidate.parent == Some(current))
                    .map(|(child, _)| child),
            );
            idx += 1;
        }
        family
    }

    fn repair(&mut self, max_passes: usize) {
        for pass in 0..max_passes {
            let mut changed = false;
            let splits: Vec<(Id, Vec<Id>)> = self
                .classification
                .iter()
                .filter(|(split, _)| self.member_set.contains(split))
                .map(|(_, branches)| {
                    let mut edges = vec![branches.on_path()];
                    edges.extend_from_slice(branches.off_path());
                    (branches.on_path(), edges)
                })
                .collect();

            for (on_path, edges) in splits {
                let Some(on_target) = self.graph.edge(on_path).map(|edge| edge.target()) else {
                    continue;
                };
                let Some(&on_row) = self.rows.get(&on_target) else {
                    continue;
                };
                for &edge in &edges[1..] {
                    let Some(target) = self.graph.edge(edge).map(|edge| edge.target()) else {
                        continue;
                    };
                    let (Some(&off_row), Some(&branch)) =
                        (self.rows.get(&target), self.branch_of.get(&target))
                    else {
                        continue;
                    };
                    if off_row >= on_row || self.branches[branch].head != target {
                        continue;
                    }
                    if self.shift_family(branch, on_row + 1) {
                        changed = true;
                    }
                }
            }

            if !changed {
                trace!(passes = pass; "Row repair converged");
                return;
            }
        }
        debug!(max_passes; "Row repair stopped at the pass limit");
    }

    /// Moves a branch family so its head lands on the first free row at or
    /// below `min_head_row`.
    fn shift_family(&mut self, branch: usize, min_head_row: usize) -> bool {
        let family = self.branch_family(branch);
        let nodes: Vec<Id> = family
            .iter()
            .flat_map(|&idx| self.branches[idx].nodes.iter().copied())
            .collect();
        let ignore: HashSet<Id> = nodes.iter().copied().collect();
        let head_row = self.rows.get(&self.branches[branch].head).copied().unwrap_or_default();
        if min_head_row <= head_row {
            return false;
        }

        let mut delta = min_head_row - head_row;
        let limit = self.members.len() + self.rows.values().max().copied().unwrap_or_default();
        for _ in 0..=limit {
            let collides = nodes.iter().any(|&id| {
                let row = self.rows.get(&id).copied().unwrap_or_default() + delta;
                let column = self.column(id);
                self.is_occupied(row, (column, column), &ignore)
            });
            if !collides {
                break;
            }
            delta += 1;
        }

        for id in nodes {
            if let Some(row) = self.rows.get_mut(&id) {
                *row += delta;
            }
        }
        true
    }

    fn into_cells(self) -> Vec<(Id, GridCell)> {
        let mut rows: Vec<usize> = self
            .members
            .iter()
            .map(|id| self.rows.get(id).copied().unwrap_or_default())
            .collect();
        compact(&mut rows);
        self.members
            .iter()
            .zip(rows)
            .map(|(&id, row)| (id, GridCell::new(self.column(id), row)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        classify::classify,
        graph::builder::build,
        model::ElementRecord,
        placement::{LongestPathSolver, place},
    };

    fn node(id: &str, element_type: &str) -> ElementRecord {
        ElementRecord::shape(id, element_type, None)
    }

    fn flow(id: &str, source: &str, target: &str) -> ElementRecord {
        ElementRecord::connection(id, "bpmn:SequenceFlow", source, target)
    }

    fn rows_of(elements: &[ElementRecord]) -> HashMap<Id, GridCell> {
        let graph = build(elements).expect("valid graph");
        let config = TraversalConfig::default();
        let classification = classify(&graph, &config);
        let placement = place(&graph, &classification, &LongestPathSolver).expect("placement");
        order_rows(&graph, &classification, &placement, &config)
    }

    fn row(cells: &HashMap<Id, GridCell>, id: &str) -> usize {
        cells.get(&Id::new(id)).expect("node has a cell").row
    }

    #[test]
    fn test_default_branch_goes_below() {
        let cells = rows_of(&[
            node("Start", "bpmn:StartEvent"),
            node("Gw", "bpmn:ExclusiveGateway").with_default("ToB"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            node("Merge", "bpmn:ExclusiveGateway"),
            node("End", "bpmn:EndEvent"),
            flow("F0", "Start", "Gw"),
            flow("ToB", "Gw", "B"),
            flow("ToA", "Gw", "A").with_condition("${valid}"),
            flow("F1", "A", "Merge"),
            flow("F2", "B", "Merge"),
            flow("F3", "Merge", "End"),
        ]);

        for id in ["Start", "Gw", "A", "Merge", "End"] {
            assert_eq!(row(&cells, id), 0, "{id} on the main row");
        }
        assert_eq!(row(&cells, "B"), 1);
    }

    #[test]
    fn test_sibling_branches_stack() {
        let cells = rows_of(&[
            node("Start", "bpmn:StartEvent"),
            node("Gw", "bpmn:InclusiveGateway"),
            node("A", "bpmn:Task"),
            node("B", "bpmn:Task"),
            node("C", "bpmn:Task"),
            flow("F0", "Start", "Gw"),
            flow("ToA", "Gw", "A").with_condition("a"),
            flow("ToB", "Gw", "B"),
            flow("ToC", "Gw", "C"),
        ]);

        assert_eq!(row(&cells, "A"), 0);
        assert_eq!(row(&cells, "B"), 1);
        assert_eq!(row(&cells, "C"), 2);
    }

    #[test]
    fn test_nested_branch_stays_below_its_parent_branch() {
        let cells = rows_of(&[
            node("Start", "bpmn:StartEvent"),
            node("Outer", "bpmn:ExclusiveGateway").with_default("ToInner"),
            node("Main", "bpmn:Task"),
            node("Inner", "bpmn:ExclusiveGateway").with_default("ToY"),
            node("X", "bpmn:Task"),
            node("Y", "bpmn:Task"),
            flow("F0", "Start", "Outer"),
            flow("ToMain", "Outer", "Main").with_condition("ok"),
            flow("ToInner", "Outer", "Inner"),
            flow("ToX", "Inner", "X").with_condition("x"),
            flow("ToY", "Inner", "Y"),
        ]);

        assert_eq!(row(&cells, "Main"), 0);
        assert_eq!(row(&cells, "Inner"), 1);
        assert_eq!(row(&cells, "X"), 1);
        assert_eq!(row(&cells, "Y"), 2);
    }

    #[test]
    fn test_boundary_only_nodes_come_last() {
        let cells = rows_of(&[
            node("Start", "bpmn:StartEvent"),
            node("Task", "bpmn:Task"),
            node("Timer", "bpmn:BoundaryEvent").with_attached_to("Task"),
            node("Handle", "bpmn:Task"),
            node("Orphan", "bpmn:Task"),
            node("End", "bpmn:EndEvent"),
            flow("F0", "Start", "Task"),
            flow("F1", "Task", "End"),
            flow("F2", "Timer", "Handle"),
        ]);

        assert_eq!(row(&cells, "Task"), 0);
        assert!(row(&cells, "Orphan") > 0);
        assert!(row(&cells, "Handle") > row(&cells, "Orphan"));
    }

    #[test]
    fn test_loop_back_keeps_main_row() {
        let cells = rows_of(&[
            node("Start", "bpmn:StartEvent"),
            node("Work", "bpmn:Task"),
            node("Check", "bpmn:ExclusiveGateway"),
            node("End", "bpmn:EndEvent"),
            flow("F0", "Start", "Work"),
            flow("F1", "Work", "Check"),
            flow("Retry", "Check", "Work").with_condition("retry"),
            flow("Done", "Check", "End").with_condition("done"),
        ]);

        for id in ["Start", "Work", "Check", "End"] {
            assert_eq!(row(&cells, id), 0, "{id} on the main row");
        }
    }
}
