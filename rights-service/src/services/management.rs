//! Whether a user may create, edit or view a grant of a role on a node.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::hierarchy::HierarchySnapshot;
use crate::models::{GrantAxis, ManagementScope, ResolvedAccess, RoleRequirements};

/// Managing powers a user holds over one target node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManagementPowers {
    pub full_admin: bool,
    pub admin_accesses: bool,
    pub data_accesses: bool,
    pub export_csv: bool,
    pub export_jupyter: bool,
    /// At least one grant contributed to the powers above.
    pub any_grant: bool,
}

impl ManagementPowers {
    /// Accumulate the powers of `grants` over `target`.
    ///
    /// A grant counts at same level when it sits on the target and at
    /// inferior levels when it sits on one of the target's ancestors. Export
    /// management applies wherever the grant sits. Grants on unusable nodes
    /// are ignored.
    pub fn collect(
        grants: &[ResolvedAccess],
        target: Uuid,
        hierarchy: &HierarchySnapshot,
        read_only: bool,
    ) -> Self {
        let mut powers = ManagementPowers::default();

        for grant in grants {
            if !hierarchy.is_usable(grant.org_node_id) {
                continue;
            }
            let caps = &grant.capabilities;
            if caps.is_full_admin() {
                powers.full_admin = true;
                powers.any_grant = true;
                continue;
            }

            let scope = if grant.org_node_id == target {
                Some(ManagementScope::SameLevel)
            } else if hierarchy.is_ancestor_of(grant.org_node_id, target) {
                Some(ManagementScope::InferiorLevels)
            } else {
                None
            };

            let mut selected = false;
            if let Some(scope) = scope {
                let admin = caps.manages(GrantAxis::AdminAccesses, scope, read_only);
                let data = caps.manages(GrantAxis::DataAccesses, scope, read_only) || admin;
                powers.admin_accesses |= admin;
                powers.data_accesses |= data;
                selected |= data;
            }
            if caps.manages_export_csv() {
                powers.export_csv = true;
                selected = true;
            }
            if caps.manages_export_jupyter() {
                powers.export_jupyter = true;
                selected = true;
            }
            powers.any_grant |= selected;
        }

        powers
    }

    /// Whether these powers cover everything `requirements` asks for.
    pub fn satisfies(&self, requirements: &RoleRequirements) -> bool {
        if self.full_admin {
            return true;
        }
        if requirements.full_admin || !self.any_grant {
            return false;
        }
        (!requirements.admin_accesses_manager || self.admin_accesses)
            && (!requirements.data_accesses_manager || self.data_accesses)
            && (!requirements.export_csv_manager || self.export_csv)
            && (!requirements.export_jupyter_manager || self.export_jupyter)
    }
}

/// Decide for a target role and node. See [`ManagementPowers::collect`].
pub fn can_manage(
    grants: &[ResolvedAccess],
    requirements: &RoleRequirements,
    target: Uuid,
    hierarchy: &HierarchySnapshot,
    read_only: bool,
) -> bool {
    let powers = ManagementPowers::collect(grants, target, hierarchy, read_only);
    let allowed = powers.satisfies(requirements);
    debug!(
        org_node_id = %target,
        read_only,
        ?powers,
        ?requirements,
        allowed,
        "Management decision"
    );
    allowed
}
