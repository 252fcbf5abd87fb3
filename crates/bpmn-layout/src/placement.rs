//! Layered placement: the adapter around the external layered-layout solver.
//!
//! Each layout scope (diagram root, participant, expanded subprocess) is solved
//! separately, inner scopes first so their content size is known when the
//! enclosing scope is placed. For every scope the adapter:
//!
//! 1. maps scope members to dense solver indices, rejecting zero-size nodes;
//! 2. collects sequence flows between members, re-anchoring flows that leave a
//!    boundary event on its host;
//! 3. reverses DFS back edges so the solver sees an acyclic graph, exploring
//!    high-priority (on-path) edges first so they are never reversed;
//! 4. invokes the [`LayeredSolver`];
//! 5. normalises the raw coordinates into integer grid cells, enforcing
//!    `column(target) > column(source)` for every forward edge.
//!
//! The resulting [`Placement`] is composed into provisional pixel positions by
//! [`grid::compose_scopes`].

pub mod grid;
mod sugiyama;

pub use sugiyama::SugiyamaSolver;

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use log::{debug, trace, warn};
use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    unionfind::UnionFind,
    visit::{DfsEvent, depth_first_search},
};

use bpmn_layout_core::{
    geometry::{Point, Size},
    identifier::Id,
};

use crate::{
    classify::BranchClassification,
    error::LayoutSolverError,
    graph::{LayoutGraph, NodeKind},
};

/// A directed edge handed to the solver, between dense node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverEdge {
    pub source: u32,
    pub target: u32,
    /// Higher values should be kept straight; on-path edges carry the highest.
    pub priority: u32,
}

/// Input of one solver invocation: node sizes by index and acyclic edges.
///
/// Layers run left to right.
#[derive(Debug, Clone, Default)]
pub struct SolverInput {
    sizes: Vec<Size>,
    edges: Vec<SolverEdge>,
}

impl SolverInput {
    pub fn new(sizes: Vec<Size>, edges: Vec<SolverEdge>) -> Self {
        Self { sizes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[Size] {
        &self.sizes
    }

    pub fn edges(&self) -> &[SolverEdge] {
        &self.edges
    }
}

/// Raw coordinates of one connected component, as returned by a solver.
///
/// Coordinates are solver specific: one axis separates layers, the other
/// orders nodes within a layer. Only their relative order is used.
#[derive(Debug, Clone, Default)]
pub struct SolvedComponent {
    positions: Vec<(u32, Point)>,
}

impl SolvedComponent {
    pub fn new(positions: Vec<(u32, Point)>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[(u32, Point)] {
        &self.positions
    }
}

/// The seam for the external layered-layout engine.
///
/// Implementations only need to position nodes that have at least one edge;
/// isolated nodes are placed by the adapter.
pub trait LayeredSolver {
    fn name(&self) -> &'static str;

    /// Solves one scope.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutSolverError`] when the engine fails or panics.
    fn solve(&self, input: &SolverInput) -> Result<Vec<SolvedComponent>, LayoutSolverError>;
}

/// Deterministic longest-path layering.
///
/// Used as the fallback engine and by tests: the layer of a node is the length
/// of the longest path reaching it, nodes are ordered within a layer by index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestPathSolver;

impl LayeredSolver for LongestPathSolver {
    fn name(&self) -> &'static str {
        "longest-path"
    }

    fn solve(&self, input: &SolverInput) -> Result<Vec<SolvedComponent>, LayoutSolverError> {
        let count = input.node_count();
        let mut layers = vec![0usize; count];
        // Relaxation terminates after `count` rounds even on cyclic input.
        for _ in 0..count {
            let mut changed = false;
            for edge in input.edges() {
                let (source, target) = (edge.source as usize, edge.target as usize);
                if source < count && target < count && layers[target] < layers[source] + 1 {
                    layers[target] = (layers[source] + 1).min(count);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut components = UnionFind::<usize>::new(count);
        let mut connected = vec![false; count];
        for edge in input.edges() {
            let (source, target) = (edge.source as usize, edge.target as usize);
            if source < count && target < count {
                components.union(source, target);
                connected[source] = true;
                connected[target] = true;
            }
        }

        let mut grouped: Vec<(usize, Vec<(u32, Point)>)> = Vec::new();
        let mut layer_fill: HashMap<(usize, usize), usize> = HashMap::new();
        for index in (0..count).filter(|&index| connected[index]) {
            let root = components.find(index);
            let slot = layer_fill.entry((root, layers[index])).or_default();
            let position = Point::new(*slot as f32, layers[index] as f32);
            *slot += 1;
            match grouped.iter_mut().find(|(group, _)| *group == root) {
                Some((_, positions)) => positions.push((index as u32, position)),
                None => grouped.push((root, vec![(index as u32, position)])),
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(_, positions)| SolvedComponent::new(positions))
            .collect())
    }
}

/// A cell of the layered grid: `column` is the layer, `row` the lane within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub column: usize,
    pub row: usize,
}

impl GridCell {
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

/// Members of one layout scope.
#[derive(Debug, Clone)]
pub struct ScopeLayout {
    scope: Option<Id>,
    members: Vec<Id>,
}

impl ScopeLayout {
    /// The scope container; `None` is the diagram root.
    pub fn scope(&self) -> Option<Id> {
        self.scope
    }

    /// Layered nodes of the scope in declaration order.
    pub fn members(&self) -> &[Id] {
        &self.members
    }
}

/// Grid cells of every layered node, grouped by scope in post-order.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    scopes: Vec<ScopeLayout>,
    cells: HashMap<Id, GridCell>,
}

impl Placement {
    pub fn scopes(&self) -> &[ScopeLayout] {
        &self.scopes
    }

    pub fn cell(&self, id: Id) -> Option<GridCell> {
        self.cells.get(&id).copied()
    }

    pub fn column(&self, id: Id) -> Option<usize> {
        self.cells.get(&id).map(|cell| cell.column)
    }

    pub fn cells(&self) -> &HashMap<Id, GridCell> {
        &self.cells
    }
}

/// Runs the solver for every scope and returns normalised grid cells.
///
/// # Errors
///
/// Returns a [`LayoutSolverError`] if a node has a degenerate size or the
/// solver fails; no positions are changed in that case.
pub fn place(
    graph: &LayoutGraph,
    classification: &BranchClassification,
    solver: &dyn LayeredSolver,
) -> Result<Placement, LayoutSolverError> {
    let mut placement = Placement::default();

    for scope in graph.scopes_post_order() {
        let members = graph.scope_members(scope);
        if members.is_empty() {
            continue;
        }

        let sizes = members
            .iter()
            .map(|&id| {
                let size = graph.bounds(id).to_size();
                if size.is_degenerate() {
                    Err(LayoutSolverError::DegenerateNode(id.to_string()))
                } else {
                    Ok(size)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let index: HashMap<Id, u32> = members
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx as u32))
            .collect();
        let edges = scope_edges(graph, classification, &index);
        let starts = start_indices(graph, &members, &edges);
        let edges = break_cycles(members.len(), edges, &starts);

        let input = SolverInput::new(sizes, edges);
        debug!(
            scope = scope.map(|id| id.to_string()).unwrap_or_default(),
            solver = solver.name(),
            nodes = input.node_count(),
            edges = input.edges().len();
            "Invoking layered solver"
        );
        let components = solver.solve(&input)?;
        let cells = normalize(&input, &components, &members)?;

        for (&id, cell) in members.iter().zip(cells) {
            trace!(id = id.to_string(), column = cell.column, row = cell.row; "Solved cell");
            placement.cells.insert(id, cell);
        }
        placement.scopes.push(ScopeLayout { scope, members });
    }

    Ok(placement)
}

/// Sequence flows between members of one scope, with boundary-event sources
/// mapped to their host. Self loops are dropped; parallel edges are merged
/// keeping the highest priority.
fn scope_edges(
    graph: &LayoutGraph,
    classification: &BranchClassification,
    index: &HashMap<Id, u32>,
) -> Vec<SolverEdge> {
    let mut edges: Vec<SolverEdge> = Vec::new();
    for edge in graph.edges().filter(|edge| edge.is_sequence_flow()) {
        let source = match graph.node(edge.source()) {
            Some(node) if node.kind() == NodeKind::BoundaryEvent => node.host(),
            Some(node) => Some(node.id()),
            None => None,
        };
        let (Some(source), Some(&target)) = (
            source.and_then(|source| index.get(&source)),
            index.get(&edge.target()),
        ) else {
            continue;
        };
        let source = *source;
        if source == target {
            continue;
        }

        let priority = classification.priority(edge.id());
        match edges
            .iter_mut()
            .find(|existing| existing.source == source && existing.target == target)
        {
            Some(existing) => existing.priority = existing.priority.max(priority),
            None => edges.push(SolverEdge {
                source,
                target,
                priority,
            }),
        }
    }
    edges
}

/// DFS roots: start events first, then nodes without incoming edges.
fn start_indices(graph: &LayoutGraph, members: &[Id], edges: &[SolverEdge]) -> Vec<usize> {
    let has_incoming: HashSet<u32> = edges.iter().map(|edge| edge.target).collect();
    let mut starts: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|&(_, &id)| graph.kind(id) == Some(NodeKind::StartEvent))
        .map(|(idx, _)| idx)
        .collect();
    let roots: Vec<usize> = (0..members.len())
        .filter(|idx| !has_incoming.contains(&(*idx as u32)) && !starts.contains(idx))
        .collect();
    starts.extend(roots);
    starts
}

/// Reverses DFS back edges so the edge set becomes acyclic.
fn break_cycles(count: usize, edges: Vec<SolverEdge>, starts: &[usize]) -> Vec<SolverEdge> {
    let mut graph: DiGraph<(), usize> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    // Neighbours are visited most-recently-added first, so adding edges in
    // ascending priority makes the DFS follow on-path edges first.
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by_key(|&idx| edges[idx].priority);
    for &idx in &order {
        let edge = edges[idx];
        graph.add_edge(
            NodeIndex::new(edge.source as usize),
            NodeIndex::new(edge.target as usize),
            idx,
        );
    }

    let mut back_edges: HashSet<(usize, usize)> = HashSet::new();
    let roots = starts
        .iter()
        .map(|&idx| NodeIndex::new(idx))
        .chain(graph.node_indices());
    depth_first_search(&graph, roots, |event| {
        if let DfsEvent::BackEdge(source, target) = event {
            back_edges.insert((source.index(), target.index()));
        }
    });

    let mut result: Vec<SolverEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        let reversed = back_edges.contains(&(edge.source as usize, edge.target as usize));
        let edge = if reversed {
            trace!(source = edge.source, target = edge.target; "Reversing back edge");
            SolverEdge {
                source: edge.target,
                target: edge.source,
                priority: edge.priority,
            }
        } else {
            edge
        };
        if !result
            .iter()
            .any(|existing| existing.source == edge.source && existing.target == edge.target)
        {
            result.push(edge);
        }
    }
    result
}

/// Converts raw solver coordinates into grid cells for every input node.
fn normalize(
    input: &SolverInput,
    components: &[SolvedComponent],
    members: &[Id],
) -> Result<Vec<GridCell>, LayoutSolverError> {
    let count = input.node_count();
    if !input.edges().is_empty() && components.is_empty() {
        return Err(LayoutSolverError::EmptyResult(count));
    }

    let mut columns: Vec<Option<usize>> = vec![None; count];
    let mut rows: Vec<usize> = vec![0; count];
    let mut row_offset = 0;
    for component in components {
        let ranked = rank_component(component, input.edges(), count);
        let mut max_row = 0;
        for (index, column, order) in ranked {
            columns[index] = Some(column);
            rows[index] = row_offset + order;
            max_row = max_row.max(order);
        }
        row_offset += max_row + 1;
    }

    for edge in input.edges() {
        for index in [edge.source, edge.target] {
            if columns.get(index as usize).copied().flatten().is_none() {
                let id = members.get(index as usize).map(Id::to_string).unwrap_or_default();
                return Err(LayoutSolverError::MissingPosition(id));
            }
        }
    }

    // Isolated nodes stack in the first column below the solved components.
    for index in 0..count {
        if columns[index].is_none() {
            columns[index] = Some(0);
            rows[index] = row_offset;
            row_offset += 1;
        }
    }
    let mut columns: Vec<usize> = columns.into_iter().map(Option::unwrap_or_default).collect();

    enforce_forward_columns(&mut columns, input.edges(), count);
    compact(&mut columns);
    separate_collisions(&columns, &mut rows);

    Ok(columns
        .into_iter()
        .zip(rows)
        .map(|(column, row)| GridCell::new(column, row))
        .collect())
}

/// Ranks the positions of one component into `(index, layer, order)`.
///
/// The layer axis is the one with the fewest distinct values among the two;
/// its direction is chosen so most edges point forward.
fn rank_component(
    component: &SolvedComponent,
    edges: &[SolverEdge],
    count: usize,
) -> Vec<(usize, usize, usize)> {
    let positions: Vec<(usize, Point)> = component
        .positions()
        .iter()
        .filter(|(index, _)| (*index as usize) < count)
        .map(|&(index, point)| (index as usize, point))
        .collect();

    let layer_of_y = distinct_ranks(positions.iter().map(|(_, point)| point.y()));
    let layer_of_x = distinct_ranks(positions.iter().map(|(_, point)| point.x()));
    let by_y = edge_balance(&positions, edges, |point| rank_of(&layer_of_y, point.y()));
    let by_x = edge_balance(&positions, edges, |point| rank_of(&layer_of_x, point.x()));
    // Edges never connect two nodes of the same layer.
    let use_y = by_y.equal <= by_x.equal;
    let (balance, layer_values) = if use_y {
        (by_y, &layer_of_y)
    } else {
        (by_x, &layer_of_x)
    };
    let flip = balance.backward > balance.forward;
    let max_layer = layer_values.len().saturating_sub(1);

    let mut ranked: Vec<(usize, usize, f32)> = positions
        .iter()
        .map(|&(index, point)| {
            let (layer_coord, order_coord) = if use_y {
                (point.y(), point.x())
            } else {
                (point.x(), point.y())
            };
            let layer = rank_of(layer_values, layer_coord);
            let layer = if flip { max_layer - layer } else { layer };
            (index, layer, order_coord)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)).then(a.0.cmp(&b.0)));

    let mut result = Vec::with_capacity(ranked.len());
    let mut fill: HashMap<usize, usize> = HashMap::new();
    for (index, layer, _) in ranked {
        let slot = fill.entry(layer).or_default();
        result.push((index, layer, *slot));
        *slot += 1;
    }
    result
}

/// Sorted distinct values, merging values closer than half a unit.
fn distinct_ranks(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(f32::total_cmp);
    let mut distinct: Vec<f32> = Vec::new();
    for value in values {
        if distinct.last().is_none_or(|last| value - last > 0.5) {
            distinct.push(value);
        }
    }
    distinct
}

fn rank_of(distinct: &[f32], value: f32) -> usize {
    distinct
        .iter()
        .rposition(|&candidate| candidate <= value + 0.5)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeBalance {
    forward: usize,
    backward: usize,
    equal: usize,
}

/// Counts edges pointing forward, backward and across along an axis.
fn edge_balance(
    positions: &[(usize, Point)],
    edges: &[SolverEdge],
    rank: impl Fn(Point) -> usize,
) -> EdgeBalance {
    let lookup: HashMap<usize, Point> = positions.iter().copied().collect();
    let mut balance = EdgeBalance::default();
    for edge in edges {
        let (Some(&source), Some(&target)) = (
            lookup.get(&(edge.source as usize)),
            lookup.get(&(edge.target as usize)),
        ) else {
            continue;
        };
        match rank(target).cmp(&rank(source)) {
            Ordering::Greater => balance.forward += 1,
            Ordering::Less => balance.backward += 1,
            Ordering::Equal => balance.equal += 1,
        }
    }
    balance
}

/// Pushes targets right until every edge spans at least one column.
fn enforce_forward_columns(columns: &mut [usize], edges: &[SolverEdge], count: usize) {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    for edge in edges {
        graph.add_edge(
            NodeIndex::new(edge.source as usize),
            NodeIndex::new(edge.target as usize),
            (),
        );
    }

    let Ok(order) = toposort(&graph, None) else {
        warn!("Solver edges still contain a cycle, skipping column repair");
        return;
    };
    for node in order {
        let source = node.index();
        for target in graph.neighbors(node) {
            let target = target.index();
            if columns[target] <= columns[source] {
                columns[target] = columns[source] + 1;
            }
        }
    }
}

/// Renumbers values to `0..n` keeping their order.
pub(crate) fn compact(values: &mut [usize]) {
    let mut distinct: Vec<usize> = values.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    for value in values.iter_mut() {
        *value = distinct.binary_search(value).unwrap_or(0);
    }
}

/// Moves nodes sharing a cell down to the next free row of their column.
fn separate_collisions(columns: &[usize], rows: &mut [usize]) {
    let mut taken: HashSet<(usize, usize)> = HashSet::new();
    for index in 0..columns.len() {
        while !taken.insert((columns[index], rows[index])) {
            rows[index] += 1;
        }
    }
}
