//! Read interfaces over the node tree, the grants and the role catalogue.
//!
//! The engine owns no persisted state; every resolution reads through these
//! traits. `close_accesses_for_nodes` is the only mutating call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::RightsError;
use crate::models::{Access, CapabilitySet, OrgNode, Profile, Role, User};

/// Read-only view of the care-site tree.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Node by id, tombstoned nodes included.
    async fn get(&self, node_id: Uuid) -> Result<Option<OrgNode>, RightsError>;

    /// Nodes for the given ids; unknown ids are skipped.
    async fn get_many(&self, node_ids: &[Uuid]) -> Result<Vec<OrgNode>, RightsError> {
        let mut nodes = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            if let Some(node) = self.get(*id).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Ancestor ids, nearest first.
    async fn ancestors(&self, node_id: Uuid) -> Result<Vec<Uuid>, RightsError> {
        self.get(node_id)
            .await?
            .map(|node| node.above_level_ids)
            .ok_or(RightsError::NodeNotFound(node_id))
    }

    /// Direct children that are not tombstoned.
    async fn children(&self, node_id: Uuid) -> Result<Vec<Uuid>, RightsError>;

    /// Tombstoned node ids.
    async fn deleted_node_ids(&self) -> Result<Vec<Uuid>, RightsError>;

    /// Counter bumped by every tree synchronisation pass.
    async fn generation(&self) -> Result<u64, RightsError> {
        Ok(0)
    }
}

/// Read view of users, profiles and accesses, plus the closing cascade.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RightsError>;

    async fn profiles_for_user(&self, user_id: Uuid) -> Result<Vec<Profile>, RightsError>;

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, RightsError>;

    /// Accesses of the given profiles. May include closed ones; callers filter.
    async fn accesses_for_profiles(
        &self,
        profile_ids: &[Uuid],
    ) -> Result<Vec<Access>, RightsError>;

    /// Set `manual_end_utc = now` on every access that is not yet closed and
    /// sits on one of `node_ids` or on no node at all. All-or-nothing.
    ///
    /// Returns the number of accesses closed by this call.
    async fn close_accesses_for_nodes(
        &self,
        node_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RightsError>;
}

/// Static role → capability table.
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, RightsError>;

    async fn capabilities(&self, role_id: Uuid) -> Result<CapabilitySet, RightsError> {
        self.find_role(role_id)
            .await?
            .map(|role| role.capabilities)
            .ok_or(RightsError::RoleNotFound(role_id))
    }
}
