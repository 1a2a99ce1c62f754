//! Capability model - closed enumeration of role rights and the bitset that carries them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A single named boolean permission a role may carry.
///
/// The string form matches the `roles` table column that stores the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FullAdmin,
    ReadLogs,
    ManageUsers,
    ReadUsers,
    ManageRoles,
    ManageAdminAccessesSameLevel,
    ReadAdminAccessesSameLevel,
    ManageAdminAccessesInferiorLevels,
    ReadAdminAccessesInferiorLevels,
    ManageDataAccessesSameLevel,
    ReadDataAccessesSameLevel,
    ManageDataAccessesInferiorLevels,
    ReadDataAccessesInferiorLevels,
    ManageExportCsvAccesses,
    ManageExportJupyterAccesses,
    ReadPatientNominative,
    ReadPatientPseudonymized,
    SearchPatientWithIdentifier,
    ReadOpposedPatientsData,
    ExportCsvNominative,
    ExportCsvPseudonymized,
    ExportJupyterNominative,
    ExportJupyterPseudonymized,
}

/// The three families a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityFamily {
    /// Patient-data reading; hierarchy-dependent unless resolved globally.
    DataReading,
    /// Rights over other users' grants.
    GrantManagement,
    /// Node-independent rights.
    Global,
}

/// Scope qualifier of a management capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementScope {
    /// Applies to the grant's own node.
    SameLevel,
    /// Applies to every proper descendant of the grant's node.
    InferiorLevels,
}

/// The two axes of grant management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAxis {
    AdminAccesses,
    DataAccesses,
}

impl Capability {
    pub const ALL: [Capability; 23] = [
        Capability::FullAdmin,
        Capability::ReadLogs,
        Capability::ManageUsers,
        Capability::ReadUsers,
        Capability::ManageRoles,
        Capability::ManageAdminAccessesSameLevel,
        Capability::ReadAdminAccessesSameLevel,
        Capability::ManageAdminAccessesInferiorLevels,
        Capability::ReadAdminAccessesInferiorLevels,
        Capability::ManageDataAccessesSameLevel,
        Capability::ReadDataAccessesSameLevel,
        Capability::ManageDataAccessesInferiorLevels,
        Capability::ReadDataAccessesInferiorLevels,
        Capability::ManageExportCsvAccesses,
        Capability::ManageExportJupyterAccesses,
        Capability::ReadPatientNominative,
        Capability::ReadPatientPseudonymized,
        Capability::SearchPatientWithIdentifier,
        Capability::ReadOpposedPatientsData,
        Capability::ExportCsvNominative,
        Capability::ExportCsvPseudonymized,
        Capability::ExportJupyterNominative,
        Capability::ExportJupyterPseudonymized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FullAdmin => "right_full_admin",
            Capability::ReadLogs => "right_read_logs",
            Capability::ManageUsers => "right_manage_users",
            Capability::ReadUsers => "right_read_users",
            Capability::ManageRoles => "right_manage_roles",
            Capability::ManageAdminAccessesSameLevel => "right_manage_admin_accesses_same_level",
            Capability::ReadAdminAccessesSameLevel => "right_read_admin_accesses_same_level",
            Capability::ManageAdminAccessesInferiorLevels => {
                "right_manage_admin_accesses_inferior_levels"
            }
            Capability::ReadAdminAccessesInferiorLevels => {
                "right_read_admin_accesses_inferior_levels"
            }
            Capability::ManageDataAccessesSameLevel => "right_manage_data_accesses_same_level",
            Capability::ReadDataAccessesSameLevel => "right_read_data_accesses_same_level",
            Capability::ManageDataAccessesInferiorLevels => {
                "right_manage_data_accesses_inferior_levels"
            }
            Capability::ReadDataAccessesInferiorLevels => {
                "right_read_data_accesses_inferior_levels"
            }
            Capability::ManageExportCsvAccesses => "right_manage_export_csv_accesses",
            Capability::ManageExportJupyterAccesses => "right_manage_export_jupyter_accesses",
            Capability::ReadPatientNominative => "right_read_patient_nominative",
            Capability::ReadPatientPseudonymized => "right_read_patient_pseudonymized",
            Capability::SearchPatientWithIdentifier => "right_search_patient_with_ipp",
            Capability::ReadOpposedPatientsData => "right_read_opposed_patients_data",
            Capability::ExportCsvNominative => "right_export_csv_nominative",
            Capability::ExportCsvPseudonymized => "right_export_csv_pseudonymized",
            Capability::ExportJupyterNominative => "right_export_jupyter_nominative",
            Capability::ExportJupyterPseudonymized => "right_export_jupyter_pseudonymized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    pub fn family(&self) -> CapabilityFamily {
        match self {
            Capability::ReadPatientNominative
            | Capability::ReadPatientPseudonymized
            | Capability::SearchPatientWithIdentifier
            | Capability::ReadOpposedPatientsData => CapabilityFamily::DataReading,
            Capability::ManageAdminAccessesSameLevel
            | Capability::ReadAdminAccessesSameLevel
            | Capability::ManageAdminAccessesInferiorLevels
            | Capability::ReadAdminAccessesInferiorLevels
            | Capability::ManageDataAccessesSameLevel
            | Capability::ReadDataAccessesSameLevel
            | Capability::ManageDataAccessesInferiorLevels
            | Capability::ReadDataAccessesInferiorLevels
            | Capability::ManageExportCsvAccesses
            | Capability::ManageExportJupyterAccesses => CapabilityFamily::GrantManagement,
            Capability::FullAdmin
            | Capability::ReadLogs
            | Capability::ManageUsers
            | Capability::ReadUsers
            | Capability::ManageRoles
            | Capability::ExportCsvNominative
            | Capability::ExportCsvPseudonymized
            | Capability::ExportJupyterNominative
            | Capability::ExportJupyterPseudonymized => CapabilityFamily::Global,
        }
    }

    /// Management capability for an axis and scope, in its manage or read variant.
    pub fn management(axis: GrantAxis, scope: ManagementScope, read_only: bool) -> Self {
        use GrantAxis::*;
        use ManagementScope::*;
        match (axis, scope, read_only) {
            (AdminAccesses, SameLevel, false) => Capability::ManageAdminAccessesSameLevel,
            (AdminAccesses, SameLevel, true) => Capability::ReadAdminAccessesSameLevel,
            (AdminAccesses, InferiorLevels, false) => Capability::ManageAdminAccessesInferiorLevels,
            (AdminAccesses, InferiorLevels, true) => Capability::ReadAdminAccessesInferiorLevels,
            (DataAccesses, SameLevel, false) => Capability::ManageDataAccessesSameLevel,
            (DataAccesses, SameLevel, true) => Capability::ReadDataAccessesSameLevel,
            (DataAccesses, InferiorLevels, false) => Capability::ManageDataAccessesInferiorLevels,
            (DataAccesses, InferiorLevels, true) => Capability::ReadDataAccessesInferiorLevels,
        }
    }

    fn bit(self) -> u32 {
        1u32 << (self as u32)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed set of capabilities held by a role.
///
/// `contains` answers for the raw flag only; `allows` also honours
/// `FullAdmin`, which subsumes every other capability.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Capability>", from = "Vec<Capability>")]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(caps: &[Capability]) -> Self {
        caps.iter().copied().collect()
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.insert(cap);
        self
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn remove(&mut self, cap: Capability) {
        self.0 &= !cap.bit();
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn allows(&self, cap: Capability) -> bool {
        self.contains(cap) || self.contains(Capability::FullAdmin)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.iter().copied().filter(|c| self.contains(*c))
    }

    pub fn intersects(&self, other: &CapabilitySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 & other.0)
    }

    pub fn difference(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 & !other.0)
    }

    pub fn is_full_admin(&self) -> bool {
        self.contains(Capability::FullAdmin)
    }

    /// Whether the set grants management of `axis` grants at `scope`.
    ///
    /// A manage variant always satisfies the read variant.
    pub fn manages(&self, axis: GrantAxis, scope: ManagementScope, read_only: bool) -> bool {
        let manage = Capability::management(axis, scope, false);
        if read_only {
            self.allows(manage) || self.allows(Capability::management(axis, scope, true))
        } else {
            self.allows(manage)
        }
    }

    /// Whether any axis is managed at `scope`.
    pub fn manages_at(&self, scope: ManagementScope, read_only: bool) -> bool {
        self.manages(GrantAxis::AdminAccesses, scope, read_only)
            || self.manages(GrantAxis::DataAccesses, scope, read_only)
    }

    pub fn manages_export_csv(&self) -> bool {
        self.allows(Capability::ManageExportCsvAccesses)
    }

    pub fn manages_export_jupyter(&self) -> bool {
        self.allows(Capability::ManageExportJupyterAccesses)
    }

    pub fn reads_nominative(&self) -> bool {
        self.allows(Capability::ReadPatientNominative)
    }

    /// Nominative reading always implies pseudonymized reading.
    pub fn reads_pseudonymized(&self) -> bool {
        self.allows(Capability::ReadPatientPseudonymized) || self.reads_nominative()
    }

    /// Capabilities of the given family.
    pub fn family(&self, family: CapabilityFamily) -> CapabilitySet {
        self.iter().filter(|c| c.family() == family).collect()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl BitOr for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | rhs.0)
    }
}

impl BitOrAssign for CapabilitySet {
    fn bitor_assign(&mut self, rhs: CapabilitySet) {
        self.0 |= rhs.0;
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().collect()
    }
}
