//! In-memory implementation of the store traits.
//!
//! Used by tests and by embedders that hold the tree and grants in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::RightsError;
use super::store::{GrantStore, NodeDirectory, RoleCatalog};
use crate::models::{Access, OrgNode, Profile, Role, User};

#[derive(Default)]
struct Tables {
    nodes: HashMap<Uuid, OrgNode>,
    roles: HashMap<Uuid, Role>,
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    accesses: HashMap<Uuid, Access>,
}

/// Store backed by maps behind a single lock.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    generation: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and register it in its ancestors' descendant lists.
    ///
    /// Parents must be inserted before their children.
    pub async fn insert_node(&self, node: OrgNode) {
        let mut tables = self.tables.write().await;
        for ancestor_id in &node.above_level_ids {
            if let Some(ancestor) = tables.nodes.get_mut(ancestor_id) {
                if !ancestor.inferior_level_ids.contains(&node.org_node_id) {
                    ancestor.inferior_level_ids.push(node.org_node_id);
                }
            }
        }
        tables.nodes.insert(node.org_node_id, node);
    }

    /// Replace a node as-is, without touching other nodes.
    pub async fn replace_node(&self, node: OrgNode) {
        self.tables
            .write()
            .await
            .nodes
            .insert(node.org_node_id, node);
    }

    /// Tombstone a node and bump the tree generation.
    pub async fn mark_node_deleted(
        &self,
        node_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RightsError> {
        let mut tables = self.tables.write().await;
        let node = tables
            .nodes
            .get_mut(&node_id)
            .ok_or(RightsError::NodeNotFound(node_id))?;
        node.deleted_utc = Some(at);
        drop(tables);
        self.bump_generation();
        Ok(())
    }

    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn insert_role(&self, role: Role) {
        self.tables.write().await.roles.insert(role.role_id, role);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.user_id, user);
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.profile_id, profile);
    }

    pub async fn insert_access(&self, access: Access) {
        self.tables
            .write()
            .await
            .accesses
            .insert(access.access_id, access);
    }

    pub async fn find_access(&self, access_id: Uuid) -> Option<Access> {
        self.tables.read().await.accesses.get(&access_id).cloned()
    }
}

#[async_trait]
impl NodeDirectory for InMemoryStore {
    async fn get(&self, node_id: Uuid) -> Result<Option<OrgNode>, RightsError> {
        Ok(self.tables.read().await.nodes.get(&node_id).cloned())
    }

    async fn get_many(&self, node_ids: &[Uuid]) -> Result<Vec<OrgNode>, RightsError> {
        let tables = self.tables.read().await;
        Ok(node_ids
            .iter()
            .filter_map(|id| tables.nodes.get(id).cloned())
            .collect())
    }

    async fn children(&self, node_id: Uuid) -> Result<Vec<Uuid>, RightsError> {
        let tables = self.tables.read().await;
        let mut children: Vec<Uuid> = tables
            .nodes
            .values()
            .filter(|n| n.parent_org_node_id == Some(node_id) && !n.is_deleted())
            .map(|n| n.org_node_id)
            .collect();
        children.sort();
        Ok(children)
    }

    async fn deleted_node_ids(&self) -> Result<Vec<Uuid>, RightsError> {
        let tables = self.tables.read().await;
        Ok(tables
            .nodes
            .values()
            .filter(|n| n.is_deleted())
            .map(|n| n.org_node_id)
            .collect())
    }

    async fn generation(&self) -> Result<u64, RightsError> {
        Ok(self.generation.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RightsError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn profiles_for_user(&self, user_id: Uuid) -> Result<Vec<Profile>, RightsError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, RightsError> {
        Ok(self.tables.read().await.profiles.get(&profile_id).cloned())
    }

    async fn accesses_for_profiles(
        &self,
        profile_ids: &[Uuid],
    ) -> Result<Vec<Access>, RightsError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accesses
            .values()
            .filter(|a| profile_ids.contains(&a.profile_id))
            .cloned()
            .collect())
    }

    async fn close_accesses_for_nodes(
        &self,
        node_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RightsError> {
        // One write guard for the whole pass keeps it all-or-nothing.
        let mut tables = self.tables.write().await;
        let mut closed = 0;
        for access in tables.accesses.values_mut() {
            let on_target = match access.org_node_id {
                Some(node_id) => node_ids.contains(&node_id),
                None => true,
            };
            let already_closed = access.manual_end_utc.is_some_and(|end| end <= now)
                || access.end_utc <= now;
            if on_target && !already_closed {
                access.manual_end_utc = Some(now);
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[async_trait]
impl RoleCatalog for InMemoryStore {
    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, RightsError> {
        Ok(self.tables.read().await.roles.get(&role_id).cloned())
    }
}
