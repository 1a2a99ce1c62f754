//! Rights resolution entry points.
//!
//! Every call reads its own snapshot: the acting user's valid accesses, their
//! roles' capabilities and the nodes involved with all their ancestors. Only
//! [`RightsEngine::close_accesses_for_nodes`] writes.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cache::CapabilityCache;
use super::error::RightsError;
use super::hierarchy::{HierarchySnapshot, NodeStatus};
use super::management;
use super::rights::{aggregate, retain_reported, ReadingPolicy, ReadingResolution};
use super::store::{GrantStore, NodeDirectory, RoleCatalog};
use super::top_nodes::{self, ScopedNode};
use super::validation::{ensure_no_overlap, validate_access_window};
use super::validity::filter_valid;
use crate::config::EngineConfig;
use crate::models::{
    Access, AccessWindow, AggregatedRights, AggregationMode, Capability, CreateAccessRequest,
    DataRights, ManagementScope, ReadableNode, ResolvedAccess, User,
};

/// The acting user with their valid accesses and the nodes they touch.
struct UserGrants {
    user: User,
    grants: Vec<ResolvedAccess>,
    hierarchy: HierarchySnapshot,
}

impl UserGrants {
    fn usable(&self) -> impl Iterator<Item = &ResolvedAccess> + '_ {
        self.grants
            .iter()
            .filter(|g| self.hierarchy.is_usable(g.org_node_id))
    }

    fn holds(&self, cap: Capability) -> bool {
        self.usable().any(|g| g.capabilities.allows(cap))
    }
}

pub struct RightsEngine {
    nodes: Arc<dyn NodeDirectory>,
    grants: Arc<dyn GrantStore>,
    roles: Arc<dyn RoleCatalog>,
    cache: CapabilityCache,
    policy: ReadingPolicy,
    config: EngineConfig,
}

impl RightsEngine {
    pub fn new(
        nodes: Arc<dyn NodeDirectory>,
        grants: Arc<dyn GrantStore>,
        roles: Arc<dyn RoleCatalog>,
        config: EngineConfig,
    ) -> Self {
        let ttl = std::time::Duration::from_secs(config.capability_cache_ttl_seconds);
        Self {
            nodes,
            grants,
            roles,
            cache: CapabilityCache::new(ttl),
            policy: ReadingPolicy::default(),
            config,
        }
    }

    /// Engine over a single store that serves all three interfaces.
    pub fn from_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: NodeDirectory + GrantStore + RoleCatalog + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn with_policy(mut self, policy: ReadingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capability_cache(&self) -> &CapabilityCache {
        &self.cache
    }

    /// Accesses of every profile of the user that are valid at `now`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn valid_accesses_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Access>, RightsError> {
        self.require_user(user_id).await?;
        self.valid_accesses(user_id, now).await
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, RightsError> {
        self.grants
            .find_user(user_id)
            .await?
            .ok_or(RightsError::UserNotFound(user_id))
    }

    async fn valid_accesses(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Access>, RightsError> {
        let profiles = self.grants.profiles_for_user(user_id).await?;
        let profile_ids: Vec<Uuid> = profiles.iter().map(|p| p.profile_id).collect();
        let accesses = self.grants.accesses_for_profiles(&profile_ids).await?;
        Ok(filter_valid(accesses, &profiles, now))
    }

    /// Load the user's valid grants and the hierarchy around them and `extra`.
    async fn load_user_grants(
        &self,
        user_id: Uuid,
        extra: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<UserGrants, RightsError> {
        self.cache.observe_generation(self.nodes.generation().await?);

        let user = self.require_user(user_id).await?;
        let accesses = self.valid_accesses(user_id, now).await?;

        let mut grants = Vec::with_capacity(accesses.len());
        for access in accesses {
            let Some(org_node_id) = access.org_node_id else {
                continue;
            };
            let capabilities = self
                .cache
                .capabilities(self.roles.as_ref(), access.role_id)
                .await?;
            grants.push(ResolvedAccess {
                access_id: access.access_id,
                org_node_id,
                role_id: access.role_id,
                capabilities,
            });
        }

        let mut seeds: Vec<Uuid> = grants.iter().map(|g| g.org_node_id).collect();
        seeds.extend_from_slice(extra);
        let hierarchy = HierarchySnapshot::load(self.nodes.as_ref(), &seeds).await?;

        debug!(user_id = %user_id, grants = grants.len(), "Loaded valid grants");

        Ok(UserGrants {
            user,
            grants,
            hierarchy,
        })
    }

    /// Minimal set of nodes the user manages, or may view grants on when
    /// `read_only`, in hierarchical order.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn managed_top_nodes(
        &self,
        user_id: Uuid,
        read_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RightsError> {
        let mut ug = self.load_user_grants(user_id, &[], now).await?;

        let mut pairs = Vec::new();
        for grant in ug.usable() {
            let caps = &grant.capabilities;
            if caps.manages_at(ManagementScope::SameLevel, read_only) {
                pairs.push(ScopedNode::same_level(grant.org_node_id));
            }
            if caps.manages_at(ManagementScope::InferiorLevels, read_only) {
                pairs.push(ScopedNode::inferior_levels(grant.org_node_id));
            }
        }

        let reduction = top_nodes::reduce(&pairs, &ug.hierarchy);

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for &id in &reduction.inferior_roots {
            children.insert(id, self.nodes.children(id).await?);
        }
        let all_children: Vec<Uuid> = children.values().flatten().copied().collect();
        ug.hierarchy.extend(self.nodes.as_ref(), &all_children).await?;

        let mut result: Vec<Uuid> = reduction
            .resolve(|id| children.remove(&id).unwrap_or_default())
            .into_iter()
            .filter(|&id| ug.hierarchy.check_usable(id))
            .collect();
        ug.hierarchy.sort_hierarchically(&mut result);

        info!(user_id = %user_id, read_only, top_nodes = result.len(), "Resolved managed top nodes");
        Ok(result)
    }

    /// Top nodes the user reads patient data on, with their strength, in
    /// hierarchical order.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn readable_top_nodes(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReadableNode>, RightsError> {
        let ug = self.load_user_grants(user_id, &[], now).await?;
        let resolution = ReadingResolution::build(
            &ug.grants,
            &ug.hierarchy,
            &self.policy,
            ug.user.unrestricted_data_read,
        );

        let mut readable = resolution.readable_top_nodes();
        readable.sort_by(|a, b| ug.hierarchy.hierarchical_cmp(a.org_node_id, b.org_node_id));
        Ok(readable)
    }

    /// Per-target rights, keeping empty records when configured to.
    pub async fn data_rights(
        &self,
        user_id: Uuid,
        targets: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Vec<DataRights>, RightsError> {
        self.data_rights_report(user_id, targets, self.config.report_empty_rights, now)
            .await
    }

    /// Per-target rights. Targets without any reading right are dropped
    /// unless `report_empty`.
    #[instrument(skip(self, targets), fields(user_id = %user_id, targets = targets.len()))]
    pub async fn data_rights_report(
        &self,
        user_id: Uuid,
        targets: &[Uuid],
        report_empty: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<DataRights>, RightsError> {
        let records = self.resolve_targets(user_id, targets, now).await?;
        Ok(retain_reported(records, report_empty))
    }

    /// Rights over the whole target set.
    #[instrument(skip(self, targets), fields(user_id = %user_id, targets = targets.len()))]
    pub async fn aggregated_rights(
        &self,
        user_id: Uuid,
        targets: &[Uuid],
        mode: AggregationMode,
        now: DateTime<Utc>,
    ) -> Result<AggregatedRights, RightsError> {
        let records = self.resolve_targets(user_id, targets, now).await?;
        let aggregated = aggregate(&records, mode);
        debug!(?mode, flags = ?aggregated.flags, "Aggregated rights");
        Ok(aggregated)
    }

    async fn resolve_targets(
        &self,
        user_id: Uuid,
        targets: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Vec<DataRights>, RightsError> {
        let mut seen = HashSet::new();
        let targets: Vec<Uuid> = targets.iter().copied().filter(|t| seen.insert(*t)).collect();

        let ug = self.load_user_grants(user_id, &targets, now).await?;
        for &target in &targets {
            ug.hierarchy.require(target)?;
        }

        let resolution = ReadingResolution::build(
            &ug.grants,
            &ug.hierarchy,
            &self.policy,
            ug.user.unrestricted_data_read,
        );

        Ok(targets
            .iter()
            .map(|&target| resolution.rights_for(target, &ug.hierarchy))
            .collect())
    }

    /// Whether the user may create or edit, or view when `read_only`, a
    /// grant of `role_id` on `org_node_id`.
    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id, org_node_id = %org_node_id))]
    pub async fn can_manage(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        org_node_id: Uuid,
        read_only: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, RightsError> {
        let ug = self.load_user_grants(user_id, &[org_node_id], now).await?;
        ug.hierarchy.require(org_node_id)?;
        let requirements = self.cache.requirements(self.roles.as_ref(), role_id).await?;

        if !ug.hierarchy.check_usable(org_node_id) {
            return Ok(false);
        }

        Ok(management::can_manage(
            &ug.grants,
            &requirements,
            org_node_id,
            &ug.hierarchy,
            read_only,
        ))
    }

    pub async fn can_read_logs(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<bool, RightsError> {
        self.holds(user_id, Capability::ReadLogs, now).await
    }

    pub async fn can_manage_users(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RightsError> {
        self.holds(user_id, Capability::ManageUsers, now).await
    }

    pub async fn can_manage_roles(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RightsError> {
        self.holds(user_id, Capability::ManageRoles, now).await
    }

    /// Whether the user reads nominative data anywhere.
    pub async fn has_any_nominative_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RightsError> {
        let ug = self.load_user_grants(user_id, &[], now).await?;
        Ok(ug.user.unrestricted_data_read || ug.usable().any(|g| g.capabilities.reads_nominative()))
    }

    #[instrument(skip(self), fields(user_id = %user_id, capability = %cap))]
    async fn holds(
        &self,
        user_id: Uuid,
        cap: Capability,
        now: DateTime<Utc>,
    ) -> Result<bool, RightsError> {
        let ug = self.load_user_grants(user_id, &[], now).await?;
        Ok(ug.holds(cap))
    }

    fn clock_skew_tolerance(&self) -> Duration {
        Duration::seconds(self.config.clock_skew_tolerance_seconds)
    }

    /// Check a grant about to be created. Returns the window to store, with a
    /// missing start defaulting to `now`.
    #[instrument(skip(self, request), fields(profile_id = %request.profile_id, org_node_id = %request.org_node_id))]
    pub async fn validate_new_access(
        &self,
        request: &CreateAccessRequest,
        now: DateTime<Utc>,
    ) -> Result<AccessWindow, RightsError> {
        self.grants
            .find_profile(request.profile_id)
            .await?
            .ok_or(RightsError::ProfileNotFound(request.profile_id))?;
        self.cache
            .capabilities(self.roles.as_ref(), request.role_id)
            .await?;
        self.require_live_node(request.org_node_id).await?;

        let window = AccessWindow::new(request.start_utc.unwrap_or(now), request.end_utc);
        validate_access_window(&window, None, now, self.clock_skew_tolerance())?;

        let existing = self
            .grants
            .accesses_for_profiles(&[request.profile_id])
            .await?;
        ensure_no_overlap(
            request.profile_id,
            request.org_node_id,
            request.role_id,
            &window,
            &existing,
            None,
            now,
        )?;

        Ok(window)
    }

    /// Check a new window for an existing grant of `profile_id`.
    #[instrument(skip(self), fields(profile_id = %profile_id, access_id = %access_id))]
    pub async fn validate_access_update(
        &self,
        profile_id: Uuid,
        access_id: Uuid,
        window: AccessWindow,
        now: DateTime<Utc>,
    ) -> Result<(), RightsError> {
        let existing = self.grants.accesses_for_profiles(&[profile_id]).await?;
        let access = existing
            .iter()
            .find(|a| a.access_id == access_id)
            .ok_or(RightsError::AccessNotFound(access_id))?;

        validate_access_window(&window, Some(access), now, self.clock_skew_tolerance())?;

        if let Some(org_node_id) = access.org_node_id {
            ensure_no_overlap(
                profile_id,
                org_node_id,
                access.role_id,
                &window,
                &existing,
                Some(access_id),
                now,
            )?;
        }
        Ok(())
    }

    async fn require_live_node(&self, org_node_id: Uuid) -> Result<(), RightsError> {
        let hierarchy = HierarchySnapshot::load(self.nodes.as_ref(), &[org_node_id]).await?;
        match hierarchy.status(org_node_id) {
            None | Some(NodeStatus::Deleted) => Err(RightsError::NodeNotFound(org_node_id)),
            Some(NodeStatus::Inconsistent(reason)) => Err(RightsError::InconsistentHierarchy {
                node_id: org_node_id,
                reason: reason.clone(),
            }),
            Some(NodeStatus::Sound) => Ok(()),
        }
    }

    /// Close every open grant on `node_ids` or without a node. Re-running
    /// with the same nodes closes nothing more.
    #[instrument(skip(self, node_ids), fields(nodes = node_ids.len()))]
    pub async fn close_accesses_for_nodes(
        &self,
        node_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RightsError> {
        let closed = self.grants.close_accesses_for_nodes(node_ids, now).await?;
        if closed > 0 {
            warn!(closed, "Closed accesses on removed nodes");
        } else {
            info!("No access to close");
        }
        Ok(closed)
    }
}
