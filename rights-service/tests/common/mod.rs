//! Test helpers for rights-service integration tests.
//!
//! Builds an in-memory care-site tree with roles, users and grants.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rights_service::config::EngineConfig;
use rights_service::models::{
    Access, Capability, CapabilitySet, OrgNode, Profile, ProfileSource, Role, User,
};
use rights_service::services::InMemoryStore;
use rights_service::RightsEngine;
use std::sync::Arc;

/// Tree used by most tests:
///
/// ```text
/// APHP (root)
/// ├── Bichat (a)
/// │   └── Cardio (a1)
/// └── Avicenne (b)
/// ```
pub struct TestWorld {
    pub store: Arc<InMemoryStore>,
    pub engine: RightsEngine,
    pub now: DateTime<Utc>,
    pub root: OrgNode,
    pub a: OrgNode,
    pub b: OrgNode,
    pub a1: OrgNode,
}

impl TestWorld {
    pub async fn spawn() -> Self {
        Self::spawn_with(EngineConfig::default()).await
    }

    pub async fn spawn_with(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let root = OrgNode::new_root("AP-HP", "APHP");
        let a = OrgNode::new_child(&root, "GH", "Bichat");
        let b = OrgNode::new_child(&root, "GH", "Avicenne");
        let a1 = OrgNode::new_child(&a, "UF", "Cardio");
        for node in [&root, &a, &b, &a1] {
            store.insert_node(node.clone()).await;
        }

        let engine = RightsEngine::from_store(store.clone(), config);

        Self {
            store,
            engine,
            now: Utc::now(),
            root,
            a,
            b,
            a1,
        }
    }

    /// Add a live node under `parent`.
    pub async fn child(&self, parent: &OrgNode, label: &str) -> OrgNode {
        let node = OrgNode::new_child(parent, "UF", label);
        self.store.insert_node(node.clone()).await;
        node
    }

    pub async fn role(&self, label: &str, caps: &[Capability]) -> Role {
        let role = Role::new(label, CapabilitySet::of(caps));
        self.store.insert_role(role.clone()).await;
        role
    }

    /// A user with one active manual profile.
    pub async fn user(&self, name: &str) -> (User, Profile) {
        let user = User::new(name);
        let profile = Profile::new(user.user_id, ProfileSource::Manual);
        self.store.insert_user(user.clone()).await;
        self.store.insert_profile(profile.clone()).await;
        (user, profile)
    }

    /// Grant open from yesterday to a year from now.
    pub async fn grant(&self, profile: &Profile, node: &OrgNode, role: &Role) -> Access {
        let access = Access::new(
            profile.profile_id,
            node.org_node_id,
            role.role_id,
            self.now - Duration::days(1),
            self.now + Duration::days(365),
        );
        self.store.insert_access(access.clone()).await;
        access
    }

    /// User holding a single grant of a fresh role carrying `caps`.
    pub async fn user_with(&self, node: &OrgNode, caps: &[Capability]) -> User {
        let (user, profile) = self.user("grantee").await;
        let role = self.role("role", caps).await;
        self.grant(&profile, node, &role).await;
        user
    }
}

pub fn sorted<T: Ord + Clone>(items: &[T]) -> Vec<T> {
    let mut items = items.to_vec();
    items.sort();
    items
}
