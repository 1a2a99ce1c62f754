//! Per-request snapshot of the nodes a resolution touches.
//!
//! Nodes live in an arena indexed by position; ancestor lists are resolved to
//! arena indices once at load time. Every node gets a status that combines
//! its own tombstone and chain check with those of its ancestors, so a single
//! lookup answers "may this node take part in resolution".

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{error, warn};
use uuid::Uuid;

use super::error::RightsError;
use super::store::NodeDirectory;
use crate::models::OrgNode;

/// Whether a loaded node may take part in resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Sound,
    /// The node or one of its ancestors carries a tombstone.
    Deleted,
    /// The node's ancestor chain, or an ancestor's, does not match the tree.
    Inconsistent(String),
}

struct Entry {
    node: OrgNode,
    /// Arena indices of the loaded ancestors, nearest first.
    above: Vec<usize>,
    status: NodeStatus,
}

/// Arena of nodes read for one resolution.
#[derive(Default)]
pub struct HierarchySnapshot {
    index: HashMap<Uuid, usize>,
    entries: Vec<Entry>,
}

impl HierarchySnapshot {
    /// Load `seeds` and all their ancestors from the directory.
    ///
    /// Unknown seeds are left out; callers decide whether that is an error.
    pub async fn load(dir: &dyn NodeDirectory, seeds: &[Uuid]) -> Result<Self, RightsError> {
        let mut snapshot = Self::default();
        snapshot.extend(dir, seeds).await?;
        Ok(snapshot)
    }

    /// Build a snapshot from nodes already in hand.
    pub fn from_nodes(nodes: impl IntoIterator<Item = OrgNode>) -> Self {
        let mut snapshot = Self::default();
        for node in nodes {
            snapshot.push(node);
        }
        snapshot.link();
        snapshot
    }

    /// Load more nodes, with their ancestors, into the snapshot.
    pub async fn extend(&mut self, dir: &dyn NodeDirectory, ids: &[Uuid]) -> Result<(), RightsError> {
        let mut pending: Vec<Uuid> = ids
            .iter()
            .copied()
            .filter(|id| !self.index.contains_key(id))
            .collect();
        let mut requested: HashSet<Uuid> = pending.iter().copied().collect();

        while !pending.is_empty() {
            let nodes = dir.get_many(&pending).await?;
            pending.clear();
            for node in nodes {
                if self.index.contains_key(&node.org_node_id) {
                    continue;
                }
                let referenced = node
                    .parent_org_node_id
                    .into_iter()
                    .chain(node.above_level_ids.iter().copied());
                for id in referenced {
                    if !self.index.contains_key(&id) && requested.insert(id) {
                        pending.push(id);
                    }
                }
                self.push(node);
            }
        }

        self.link();
        Ok(())
    }

    fn push(&mut self, node: OrgNode) {
        if self.index.contains_key(&node.org_node_id) {
            return;
        }
        self.index.insert(node.org_node_id, self.entries.len());
        self.entries.push(Entry {
            node,
            above: Vec::new(),
            status: NodeStatus::Sound,
        });
    }

    /// Resolve ancestor indices and recompute every status.
    fn link(&mut self) {
        let own: Vec<NodeStatus> = self
            .entries
            .iter()
            .map(|entry| {
                let node = &entry.node;
                if node.is_deleted() {
                    return NodeStatus::Deleted;
                }
                let parent = node
                    .parent_org_node_id
                    .and_then(|id| self.index.get(&id))
                    .map(|&i| &self.entries[i].node);
                if let Err(reason) = node.check_chain(parent) {
                    error!(
                        org_node_id = %node.org_node_id,
                        reason = %reason,
                        "Inconsistent hierarchy, node fails closed"
                    );
                    return NodeStatus::Inconsistent(reason);
                }
                match node
                    .above_level_ids
                    .iter()
                    .find(|id| !self.index.contains_key(id))
                {
                    Some(missing) => {
                        let reason = format!("ancestor {} is missing", missing);
                        error!(
                            org_node_id = %node.org_node_id,
                            reason = %reason,
                            "Inconsistent hierarchy, node fails closed"
                        );
                        NodeStatus::Inconsistent(reason)
                    }
                    None => NodeStatus::Sound,
                }
            })
            .collect();

        for i in 0..self.entries.len() {
            let above: Vec<usize> = self.entries[i]
                .node
                .above_level_ids
                .iter()
                .filter_map(|id| self.index.get(id).copied())
                .collect();

            let mut status = own[i].clone();
            if status == NodeStatus::Sound {
                for &a in &above {
                    match &own[a] {
                        NodeStatus::Sound => {}
                        NodeStatus::Deleted => {
                            status = NodeStatus::Deleted;
                        }
                        NodeStatus::Inconsistent(_) => {
                            status = NodeStatus::Inconsistent(format!(
                                "ancestor {} is inconsistent",
                                self.entries[a].node.org_node_id
                            ));
                            break;
                        }
                    }
                }
            }

            let entry = &mut self.entries[i];
            entry.above = above;
            entry.status = status;
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: Uuid) -> Option<&OrgNode> {
        self.index.get(&id).map(|&i| &self.entries[i].node)
    }

    /// Status of a loaded node; `None` when the directory does not know it.
    pub fn status(&self, id: Uuid) -> Option<&NodeStatus> {
        self.index.get(&id).map(|&i| &self.entries[i].status)
    }

    pub fn is_usable(&self, id: Uuid) -> bool {
        matches!(self.status(id), Some(NodeStatus::Sound))
    }

    /// Fail with `NodeNotFound` for ids the directory does not know.
    pub fn require(&self, id: Uuid) -> Result<(), RightsError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(RightsError::NodeNotFound(id))
        }
    }

    /// Like [`is_usable`](Self::is_usable), logging why a node is refused.
    pub fn check_usable(&self, id: Uuid) -> bool {
        match self.status(id) {
            Some(NodeStatus::Sound) => true,
            Some(NodeStatus::Deleted) => {
                warn!(org_node_id = %id, "Node is deleted, no rights resolved");
                false
            }
            Some(NodeStatus::Inconsistent(reason)) => {
                warn!(org_node_id = %id, reason = %reason, "Node is inconsistent, no rights resolved");
                false
            }
            None => false,
        }
    }

    /// Loaded ancestor ids, nearest first.
    pub fn ancestors(&self, id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.index
            .get(&id)
            .into_iter()
            .flat_map(|&i| self.entries[i].above.iter())
            .map(|&a| self.entries[a].node.org_node_id)
    }

    /// The node itself followed by its ancestors.
    pub fn reach(&self, id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    /// Whether a proper ancestor of `id` is in `set`.
    pub fn has_ancestor_in(&self, id: Uuid, set: &HashSet<Uuid>) -> bool {
        self.ancestors(id).any(|a| set.contains(&a))
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor_of(&self, ancestor: Uuid, id: Uuid) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Labels from the root down to the node.
    pub fn label_path(&self, id: Uuid) -> Vec<&str> {
        let Some(&i) = self.index.get(&id) else {
            return Vec::new();
        };
        let entry = &self.entries[i];
        entry
            .above
            .iter()
            .rev()
            .map(|&a| self.entries[a].node.node_label.as_str())
            .chain(std::iter::once(entry.node.node_label.as_str()))
            .collect()
    }

    /// Order by label path from the root, then by id.
    pub fn hierarchical_cmp(&self, a: Uuid, b: Uuid) -> Ordering {
        self.label_path(a)
            .cmp(&self.label_path(b))
            .then_with(|| a.cmp(&b))
    }

    pub fn sort_hierarchically(&self, ids: &mut [Uuid]) {
        ids.sort_by(|a, b| self.hierarchical_cmp(*a, *b));
    }
}
