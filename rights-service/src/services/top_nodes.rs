//! Reduction of scoped grant nodes to the minimal covering set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::hierarchy::HierarchySnapshot;
use crate::models::ManagementScope;

/// A node reached by a grant at a given scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedNode {
    pub org_node_id: Uuid,
    pub scope: ManagementScope,
}

impl ScopedNode {
    pub fn same_level(org_node_id: Uuid) -> Self {
        Self {
            org_node_id,
            scope: ManagementScope::SameLevel,
        }
    }

    pub fn inferior_levels(org_node_id: Uuid) -> Self {
        Self {
            org_node_id,
            scope: ManagementScope::InferiorLevels,
        }
    }
}

/// Outcome of a reduction, before inferior-levels nodes are expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopNodeReduction {
    /// Same-level nodes no other pair covers.
    pub same_level: Vec<Uuid>,
    /// Inferior-levels nodes whose direct children make up their reach.
    pub inferior_roots: Vec<Uuid>,
}

impl TopNodeReduction {
    /// Final set: surviving same-level nodes plus the children of the
    /// surviving inferior-levels nodes, deduplicated.
    pub fn resolve<F, I>(&self, mut children_of: F) -> Vec<Uuid>
    where
        F: FnMut(Uuid) -> I,
        I: IntoIterator<Item = Uuid>,
    {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let expanded = self
            .inferior_roots
            .iter()
            .flat_map(|&id| children_of(id).into_iter().collect::<Vec<_>>());
        for id in self.same_level.iter().copied().chain(expanded) {
            if seen.insert(id) {
                result.push(id);
            }
        }
        result
    }
}

/// Drop every pair already covered by another pair of the list.
///
/// A same-level node is dropped when one of its ancestors appears at any
/// scope. An inferior-levels node is dropped when it is also a surviving
/// same-level node or when one of its ancestors appears at any scope.
pub fn reduce(pairs: &[ScopedNode], hierarchy: &HierarchySnapshot) -> TopNodeReduction {
    let mut same: Vec<Uuid> = Vec::new();
    let mut inferior: Vec<Uuid> = Vec::new();
    for pair in pairs {
        let bucket = match pair.scope {
            ManagementScope::SameLevel => &mut same,
            ManagementScope::InferiorLevels => &mut inferior,
        };
        if !bucket.contains(&pair.org_node_id) {
            bucket.push(pair.org_node_id);
        }
    }

    let all: HashSet<Uuid> = same.iter().chain(inferior.iter()).copied().collect();

    let top_same: Vec<Uuid> = same
        .into_iter()
        .filter(|&id| !hierarchy.has_ancestor_in(id, &all))
        .collect();
    let top_same_set: HashSet<Uuid> = top_same.iter().copied().collect();

    let inferior_roots: Vec<Uuid> = inferior
        .into_iter()
        .filter(|&id| !top_same_set.contains(&id) && !hierarchy.has_ancestor_in(id, &all))
        .collect();

    debug!(
        input = pairs.len(),
        same_level = top_same.len(),
        inferior_roots = inferior_roots.len(),
        "Reduced top nodes"
    );

    TopNodeReduction {
        same_level: top_same,
        inferior_roots,
    }
}

/// Keep the nodes of `ids` that have no proper ancestor in `ids`.
pub fn drop_covered(ids: &HashSet<Uuid>, hierarchy: &HierarchySnapshot) -> HashSet<Uuid> {
    ids.iter()
        .copied()
        .filter(|&id| !hierarchy.has_ancestor_in(id, ids))
        .collect()
}
