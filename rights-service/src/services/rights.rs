//! Patient-data reading rights over target nodes.
//!
//! Reading is hierarchical: a nominative or pseudonymized grant on a node
//! covers every descendant. Search, opposed-patient and export rights are
//! node-independent by default; [`ReadingPolicy`] lets any of them be
//! resolved through the hierarchy instead.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::hierarchy::HierarchySnapshot;
use super::top_nodes::drop_covered;
use crate::models::{
    AggregatedRights, AggregationMode, Capability, CapabilitySet, DataRights, ReadStrength,
    ReadableNode, ResolvedAccess, RightFlags,
};

/// Capabilities reported alongside the reading strength.
const FLAG_CAPABILITIES: [Capability; 6] = [
    Capability::SearchPatientWithIdentifier,
    Capability::ReadOpposedPatientsData,
    Capability::ExportCsvNominative,
    Capability::ExportCsvPseudonymized,
    Capability::ExportJupyterNominative,
    Capability::ExportJupyterPseudonymized,
];

/// Which reported capabilities hold everywhere once granted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingPolicy {
    global: CapabilitySet,
}

impl Default for ReadingPolicy {
    fn default() -> Self {
        Self {
            global: CapabilitySet::of(&FLAG_CAPABILITIES),
        }
    }
}

impl ReadingPolicy {
    /// Resolve `cap` through the hierarchy rather than globally.
    pub fn hierarchical(mut self, cap: Capability) -> Self {
        self.global.remove(cap);
        self
    }

    pub fn is_global(&self, cap: Capability) -> bool {
        self.global.contains(cap)
    }

    fn global_caps(&self) -> CapabilitySet {
        self.global
    }

    fn hierarchical_caps(&self) -> CapabilitySet {
        CapabilitySet::of(&FLAG_CAPABILITIES).difference(&self.global)
    }
}

/// Reduced view of a user's reading grants, ready to answer per-target queries.
#[derive(Debug, Clone, Default)]
pub struct ReadingResolution {
    top_nominative: HashSet<Uuid>,
    top_pseudo: HashSet<Uuid>,
    global: RightFlags,
    /// Grant nodes with the hierarchically resolved flag capabilities they carry.
    scoped: Vec<(Uuid, CapabilitySet)>,
    full_admin: bool,
    unrestricted: bool,
}

impl ReadingResolution {
    /// Reduce `grants` against the loaded hierarchy.
    ///
    /// Grants on nodes that are not usable are ignored.
    pub fn build(
        grants: &[ResolvedAccess],
        hierarchy: &HierarchySnapshot,
        policy: &ReadingPolicy,
        unrestricted: bool,
    ) -> Self {
        let usable: Vec<&ResolvedAccess> = grants
            .iter()
            .filter(|g| hierarchy.is_usable(g.org_node_id))
            .collect();

        let full_admin = usable.iter().any(|g| g.capabilities.is_full_admin());

        let nominative: HashSet<Uuid> = usable
            .iter()
            .filter(|g| g.capabilities.reads_nominative())
            .map(|g| g.org_node_id)
            .collect();
        let pseudo: HashSet<Uuid> = usable
            .iter()
            .filter(|g| g.capabilities.reads_pseudonymized())
            .map(|g| g.org_node_id)
            .collect();

        let top_nominative = drop_covered(&nominative, hierarchy);
        let covering: HashSet<Uuid> = pseudo.union(&top_nominative).copied().collect();
        let top_pseudo: HashSet<Uuid> = pseudo
            .iter()
            .copied()
            .filter(|id| !top_nominative.contains(id) && !hierarchy.has_ancestor_in(*id, &covering))
            .collect();

        let held: CapabilitySet = usable
            .iter()
            .fold(CapabilitySet::empty(), |acc, g| acc | g.capabilities);
        let mut global = RightFlags::default();
        global.apply_capabilities(&held.intersection(&policy.global_caps()));

        let hierarchical = policy.hierarchical_caps();
        let scoped = usable
            .iter()
            .map(|g| (g.org_node_id, g.capabilities.intersection(&hierarchical)))
            .filter(|(_, caps)| !caps.is_empty())
            .collect();

        debug!(
            grants = grants.len(),
            top_nominative = top_nominative.len(),
            top_pseudo = top_pseudo.len(),
            full_admin,
            unrestricted,
            "Reduced reading grants"
        );

        Self {
            top_nominative,
            top_pseudo,
            global,
            scoped,
            full_admin,
            unrestricted,
        }
    }

    /// Whether the user reads everything without consulting the hierarchy.
    pub fn is_unrestricted(&self) -> bool {
        self.full_admin || self.unrestricted
    }

    /// Top reading nodes with their strength, nominative first. Unordered
    /// within a strength.
    pub fn readable_top_nodes(&self) -> Vec<ReadableNode> {
        let nominative = self.top_nominative.iter().map(|&id| ReadableNode {
            org_node_id: id,
            strength: ReadStrength::Nominative,
        });
        let pseudo = self.top_pseudo.iter().map(|&id| ReadableNode {
            org_node_id: id,
            strength: ReadStrength::Pseudonymized,
        });
        nominative.chain(pseudo).collect()
    }

    /// Rights on one target. Unusable targets get no rights.
    pub fn rights_for(&self, target: Uuid, hierarchy: &HierarchySnapshot) -> DataRights {
        if !hierarchy.check_usable(target) {
            return DataRights::none(target);
        }
        if self.full_admin {
            return DataRights {
                org_node_id: target,
                flags: RightFlags::all(),
            };
        }

        let reach: Vec<Uuid> = hierarchy.reach(target).collect();
        let mut flags = self.global;

        if reach.iter().any(|id| self.top_nominative.contains(id)) {
            flags.apply_strength(ReadStrength::Nominative);
        } else if reach.iter().any(|id| self.top_pseudo.contains(id)) {
            flags.apply_strength(ReadStrength::Pseudonymized);
        }

        let reached: CapabilitySet = self
            .scoped
            .iter()
            .filter(|(node, _)| reach.contains(node))
            .fold(CapabilitySet::empty(), |acc, (_, caps)| acc | *caps);
        flags.apply_capabilities(&reached);

        if self.unrestricted {
            flags.apply_strength(ReadStrength::Nominative);
            flags.search_by_identifier = true;
            flags.read_opposed_patients = true;
        }

        DataRights {
            org_node_id: target,
            flags,
        }
    }
}

/// Collapse per-target records into one answer.
///
/// `Min` needs every target to hold the right, `Max` at least one. An empty
/// target set holds nothing in either mode.
pub fn aggregate(records: &[DataRights], mode: AggregationMode) -> AggregatedRights {
    let flags = if records.is_empty() {
        RightFlags::default()
    } else {
        match mode {
            AggregationMode::Min => records
                .iter()
                .fold(RightFlags::all(), |acc, r| acc.and(r.flags)),
            AggregationMode::Max => records
                .iter()
                .fold(RightFlags::default(), |acc, r| acc.or(r.flags)),
        }
    };
    AggregatedRights {
        mode,
        target_count: records.len(),
        flags,
    }
}

/// Drop records without any reading right unless empty ones are requested.
pub fn retain_reported(records: Vec<DataRights>, report_empty: bool) -> Vec<DataRights> {
    if report_empty {
        return records;
    }
    records
        .into_iter()
        .filter(|r| r.flags.has_any_reading())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrgNode;

    struct Fixture {
        root: OrgNode,
        a: OrgNode,
        b: OrgNode,
        a1: OrgNode,
        snapshot: HierarchySnapshot,
    }

    fn fixture() -> Fixture {
        let root = OrgNode::new_root("AP-HP", "R");
        let a = OrgNode::new_child(&root, "GH", "A");
        let b = OrgNode::new_child(&root, "GH", "B");
        let a1 = OrgNode::new_child(&a, "UF", "A1");
        let snapshot =
            HierarchySnapshot::from_nodes([root.clone(), a.clone(), b.clone(), a1.clone()]);
        Fixture {
            root,
            a,
            b,
            a1,
            snapshot,
        }
    }

    fn grant(node: &OrgNode, caps: &[Capability]) -> ResolvedAccess {
        ResolvedAccess {
            access_id: Uuid::new_v4(),
            org_node_id: node.org_node_id,
            role_id: Uuid::new_v4(),
            capabilities: CapabilitySet::of(caps),
        }
    }

    fn resolve(f: &Fixture, grants: &[ResolvedAccess]) -> ReadingResolution {
        ReadingResolution::build(grants, &f.snapshot, &ReadingPolicy::default(), false)
    }

    #[test]
    fn test_reading_propagates_downwards() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.a, &[Capability::ReadPatientNominative])]);

        let rights = r.rights_for(f.a1.org_node_id, &f.snapshot);
        assert!(rights.flags.read_nominative);
        assert!(rights.flags.read_pseudonymized);

        let root = r.rights_for(f.root.org_node_id, &f.snapshot);
        assert!(!root.flags.read_pseudonymized);
    }

    #[test]
    fn test_nominative_wins_over_pseudonymized() {
        let f = fixture();
        let r = resolve(
            &f,
            &[
                grant(&f.a, &[Capability::ReadPatientPseudonymized]),
                grant(&f.a, &[Capability::ReadPatientNominative]),
            ],
        );

        let tops = r.readable_top_nodes();
        assert_eq!(tops.len(), 1);
        assert_eq!(tops[0].strength, ReadStrength::Nominative);
        assert!(r.rights_for(f.a.org_node_id, &f.snapshot).flags.read_nominative);
    }

    #[test]
    fn test_pseudo_ancestor_keeps_nominative_descendant() {
        let f = fixture();
        let r = resolve(
            &f,
            &[
                grant(&f.root, &[Capability::ReadPatientPseudonymized]),
                grant(&f.a1, &[Capability::ReadPatientNominative]),
            ],
        );

        let a1 = r.rights_for(f.a1.org_node_id, &f.snapshot);
        assert!(a1.flags.read_nominative);
        let b = r.rights_for(f.b.org_node_id, &f.snapshot);
        assert!(!b.flags.read_nominative);
        assert!(b.flags.read_pseudonymized);
        assert_eq!(r.readable_top_nodes().len(), 2);
    }

    #[test]
    fn test_pseudo_chain_collapses() {
        let f = fixture();
        let r = resolve(
            &f,
            &[
                grant(&f.a, &[Capability::ReadPatientPseudonymized]),
                grant(&f.a1, &[Capability::ReadPatientPseudonymized]),
            ],
        );
        assert_eq!(
            r.readable_top_nodes(),
            vec![ReadableNode {
                org_node_id: f.a.org_node_id,
                strength: ReadStrength::Pseudonymized
            }]
        );
    }

    #[test]
    fn test_min_and_max_over_two_targets() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.a, &[Capability::ReadPatientNominative])]);
        let records = vec![
            r.rights_for(f.a.org_node_id, &f.snapshot),
            r.rights_for(f.b.org_node_id, &f.snapshot),
        ];

        assert!(aggregate(&records, AggregationMode::Max).flags.read_nominative);
        assert!(!aggregate(&records, AggregationMode::Min).flags.read_nominative);
    }

    #[test]
    fn test_empty_target_set_holds_nothing() {
        let agg = aggregate(&[], AggregationMode::Min);
        assert_eq!(agg.flags, RightFlags::default());
        assert_eq!(agg.target_count, 0);
    }

    #[test]
    fn test_global_search_applies_everywhere() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.a1, &[Capability::SearchPatientWithIdentifier])]);
        assert!(r.rights_for(f.b.org_node_id, &f.snapshot).flags.search_by_identifier);
    }

    #[test]
    fn test_search_can_be_resolved_hierarchically() {
        let f = fixture();
        let policy = ReadingPolicy::default().hierarchical(Capability::SearchPatientWithIdentifier);
        let r = ReadingResolution::build(
            &[grant(&f.a, &[Capability::SearchPatientWithIdentifier])],
            &f.snapshot,
            &policy,
            false,
        );
        assert!(r.rights_for(f.a1.org_node_id, &f.snapshot).flags.search_by_identifier);
        assert!(!r.rights_for(f.b.org_node_id, &f.snapshot).flags.search_by_identifier);
    }

    #[test]
    fn test_full_admin_reads_everything() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.a1, &[Capability::FullAdmin])]);
        assert!(r.is_unrestricted());
        assert_eq!(r.rights_for(f.b.org_node_id, &f.snapshot).flags, RightFlags::all());
    }

    #[test]
    fn test_unrestricted_user_reads_without_exports() {
        let f = fixture();
        let r = ReadingResolution::build(&[], &f.snapshot, &ReadingPolicy::default(), true);
        let flags = r.rights_for(f.b.org_node_id, &f.snapshot).flags;
        assert!(flags.read_nominative);
        assert!(flags.read_opposed_patients);
        assert!(!flags.export_csv_nominative);
    }

    #[test]
    fn test_unknown_target_has_no_rights() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.root, &[Capability::FullAdmin])]);
        let rights = r.rights_for(Uuid::new_v4(), &f.snapshot);
        assert_eq!(rights.flags, RightFlags::default());
    }

    #[test]
    fn test_retain_reported_drops_empty_records() {
        let f = fixture();
        let r = resolve(&f, &[grant(&f.a, &[Capability::ReadPatientPseudonymized])]);
        let records = vec![
            r.rights_for(f.a.org_node_id, &f.snapshot),
            r.rights_for(f.b.org_node_id, &f.snapshot),
        ];
        assert_eq!(retain_reported(records.clone(), false).len(), 1);
        assert_eq!(retain_reported(records, true).len(), 2);
    }
}
