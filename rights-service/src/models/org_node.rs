//! Org node model - care-site hierarchy with precomputed ancestor and descendant lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Org node entity (hospital, department, unit...).
///
/// `above_level_ids` runs nearest ancestor first. Both id lists are produced
/// by the tree synchronisation and are read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgNode {
    pub org_node_id: Uuid,
    pub parent_org_node_id: Option<Uuid>,
    pub node_type_code: String,
    pub node_label: String,
    pub level_val: i32,
    pub above_level_ids: Vec<Uuid>,
    pub inferior_level_ids: Vec<Uuid>,
    pub deleted_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl OrgNode {
    /// Create a new root node.
    pub fn new_root(node_type_code: impl Into<String>, node_label: impl Into<String>) -> Self {
        Self {
            org_node_id: Uuid::new_v4(),
            parent_org_node_id: None,
            node_type_code: node_type_code.into(),
            node_label: node_label.into(),
            level_val: 1,
            above_level_ids: Vec::new(),
            inferior_level_ids: Vec::new(),
            deleted_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Create a new node under `parent`, chaining its ancestor list.
    ///
    /// The parent's `inferior_level_ids` are not touched; the owner of the
    /// tree recomputes descendants once the batch is complete.
    pub fn new_child(
        parent: &OrgNode,
        node_type_code: impl Into<String>,
        node_label: impl Into<String>,
    ) -> Self {
        let mut above_level_ids = Vec::with_capacity(parent.above_level_ids.len() + 1);
        above_level_ids.push(parent.org_node_id);
        above_level_ids.extend_from_slice(&parent.above_level_ids);

        Self {
            org_node_id: Uuid::new_v4(),
            parent_org_node_id: Some(parent.org_node_id),
            node_type_code: node_type_code.into(),
            node_label: node_label.into(),
            level_val: parent.level_val + 1,
            above_level_ids,
            inferior_level_ids: Vec::new(),
            deleted_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Check if this is a root node.
    pub fn is_root(&self) -> bool {
        self.parent_org_node_id.is_none()
    }

    /// Check if the node carries a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted_utc.is_some()
    }

    /// Ids of the node itself followed by its ancestors, nearest first.
    pub fn self_and_above_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.org_node_id).chain(self.above_level_ids.iter().copied())
    }

    /// Verify the ancestor list chains to the parent.
    ///
    /// Returns a description of the first mismatch found.
    pub fn check_chain(&self, parent: Option<&OrgNode>) -> Result<(), String> {
        match (self.parent_org_node_id, parent) {
            (None, _) => {
                if self.above_level_ids.is_empty() {
                    Ok(())
                } else {
                    Err("root node lists ancestors".to_string())
                }
            }
            (Some(parent_id), None) => Err(format!("parent {} is missing", parent_id)),
            (Some(parent_id), Some(parent)) => {
                if parent.org_node_id != parent_id {
                    return Err(format!(
                        "parent id {} does not match loaded parent {}",
                        parent_id, parent.org_node_id
                    ));
                }
                let expected = parent.self_and_above_ids();
                if !self.above_level_ids.iter().copied().eq(expected) {
                    return Err(format!(
                        "ancestor list does not extend parent {} ancestors",
                        parent_id
                    ));
                }
                if self.above_level_ids.contains(&self.org_node_id) {
                    return Err("node lists itself as ancestor".to_string());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_chains_ancestors_nearest_first() {
        let root = OrgNode::new_root("AP-HP", "Root");
        let hospital = OrgNode::new_child(&root, "GH", "Hospital");
        let unit = OrgNode::new_child(&hospital, "UF", "Unit");

        assert_eq!(unit.level_val, 3);
        assert_eq!(
            unit.above_level_ids,
            vec![hospital.org_node_id, root.org_node_id]
        );
        assert!(unit.check_chain(Some(&hospital)).is_ok());
        assert!(root.is_root());
    }

    #[test]
    fn test_check_chain_detects_broken_list() {
        let root = OrgNode::new_root("AP-HP", "Root");
        let hospital = OrgNode::new_child(&root, "GH", "Hospital");
        let mut unit = OrgNode::new_child(&hospital, "UF", "Unit");
        unit.above_level_ids = vec![hospital.org_node_id];

        assert!(unit.check_chain(Some(&hospital)).is_err());
        assert!(unit.check_chain(None).is_err());
    }

    #[test]
    fn test_root_with_ancestors_is_inconsistent() {
        let mut root = OrgNode::new_root("AP-HP", "Root");
        root.above_level_ids = vec![Uuid::new_v4()];
        assert!(root.check_chain(None).is_err());
    }
}
