use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use bpmn_layout_core::identifier::Id;

use crate::error::GraphBuildError;

/// Ordered forest mirroring pools, lanes, subprocesses and flow nodes.
///
/// Children keep declaration order. Boundary events are children of their
/// host's container, never of the host itself.
#[derive(Debug, Clone, Default)]
pub struct ContainmentTree {
    roots: Vec<Id>,
    children: IndexMap<Id, Vec<Id>>,
    parents: HashMap<Id, Id>,
}

impl ContainmentTree {
    /// Builds the tree from `(node, parent)` pairs in declaration order.
    ///
    /// Parents that are not themselves listed are treated as absent, making the
    /// node a root.
    ///
    /// # Errors
    ///
    /// Returns [`GraphBuildError::ContainmentCycle`] if following parent links
    /// from some node returns to that node.
    pub fn new(entries: &[(Id, Option<Id>)]) -> Result<Self, GraphBuildError> {
        let known: HashSet<Id> = entries.iter().map(|(id, _)| *id).collect();
        let parent_of: HashMap<Id, Id> = entries
            .iter()
            .filter_map(|&(id, parent)| parent.filter(|p| known.contains(p)).map(|p| (id, p)))
            .collect();

        for &(id, _) in entries {
            let mut seen = HashSet::from([id]);
            let mut current = parent_of.get(&id).copied();
            while let Some(parent) = current {
                if !seen.insert(parent) {
                    return Err(GraphBuildError::ContainmentCycle(id.to_string()));
                }
                current = parent_of.get(&parent).copied();
            }
        }

        let mut tree = Self::default();
        for &(id, _) in entries {
            tree.children.entry(id).or_default();
            match parent_of.get(&id) {
                Some(&parent) => {
                    tree.children.entry(parent).or_default().push(id);
                    tree.parents.insert(id, parent);
                }
                None => tree.roots.push(id),
            }
        }
        Ok(tree)
    }

    /// Top-level nodes in declaration order.
    pub fn roots(&self) -> &[Id] {
        &self.roots
    }

    pub fn parent(&self, id: Id) -> Option<Id> {
        self.parents.get(&id).copied()
    }

    /// Direct children in declaration order.
    pub fn children(&self, id: Id) -> &[Id] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All nodes, children before their parents.
    pub fn post_order(&self) -> Vec<Id> {
        let mut order = Vec::with_capacity(self.children.len());
        let mut stack: Vec<(Id, bool)> = self.roots.iter().rev().map(|&id| (id, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.children(id).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}
