//! Rights report types returned by the resolution engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::{Capability, CapabilitySet};

/// Strength of patient-data visibility. Nominative implies pseudonymized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrength {
    Pseudonymized,
    Nominative,
}

/// How rights over several target nodes collapse into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// The right must hold on every target.
    Min,
    /// The right must hold on at least one target.
    Max,
}

/// Data rights flags, per node or aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightFlags {
    pub read_nominative: bool,
    pub read_pseudonymized: bool,
    pub search_by_identifier: bool,
    pub read_opposed_patients: bool,
    pub export_csv_nominative: bool,
    pub export_csv_pseudonymized: bool,
    pub export_jupyter_nominative: bool,
    pub export_jupyter_pseudonymized: bool,
}

impl RightFlags {
    pub fn all() -> Self {
        Self {
            read_nominative: true,
            read_pseudonymized: true,
            search_by_identifier: true,
            read_opposed_patients: true,
            export_csv_nominative: true,
            export_csv_pseudonymized: true,
            export_jupyter_nominative: true,
            export_jupyter_pseudonymized: true,
        }
    }

    /// Set the search, opposed-patient and export flags carried by `caps`.
    pub fn apply_capabilities(&mut self, caps: &CapabilitySet) {
        self.search_by_identifier |= caps.allows(Capability::SearchPatientWithIdentifier);
        self.read_opposed_patients |= caps.allows(Capability::ReadOpposedPatientsData);
        self.export_csv_nominative |= caps.allows(Capability::ExportCsvNominative);
        self.export_csv_pseudonymized |= caps.allows(Capability::ExportCsvPseudonymized);
        self.export_jupyter_nominative |= caps.allows(Capability::ExportJupyterNominative);
        self.export_jupyter_pseudonymized |= caps.allows(Capability::ExportJupyterPseudonymized);
    }

    /// Set hierarchical reading at `strength`.
    pub fn apply_strength(&mut self, strength: ReadStrength) {
        match strength {
            ReadStrength::Nominative => {
                self.read_nominative = true;
                self.read_pseudonymized = true;
            }
            ReadStrength::Pseudonymized => self.read_pseudonymized = true,
        }
    }

    /// Whether any patient-data reading right is set.
    pub fn has_any_reading(&self) -> bool {
        self.read_nominative
            || self.read_pseudonymized
            || self.search_by_identifier
            || self.read_opposed_patients
    }

    pub fn and(self, other: RightFlags) -> RightFlags {
        RightFlags {
            read_nominative: self.read_nominative && other.read_nominative,
            read_pseudonymized: self.read_pseudonymized && other.read_pseudonymized,
            search_by_identifier: self.search_by_identifier && other.search_by_identifier,
            read_opposed_patients: self.read_opposed_patients && other.read_opposed_patients,
            export_csv_nominative: self.export_csv_nominative && other.export_csv_nominative,
            export_csv_pseudonymized: self.export_csv_pseudonymized
                && other.export_csv_pseudonymized,
            export_jupyter_nominative: self.export_jupyter_nominative
                && other.export_jupyter_nominative,
            export_jupyter_pseudonymized: self.export_jupyter_pseudonymized
                && other.export_jupyter_pseudonymized,
        }
    }

    pub fn or(self, other: RightFlags) -> RightFlags {
        RightFlags {
            read_nominative: self.read_nominative || other.read_nominative,
            read_pseudonymized: self.read_pseudonymized || other.read_pseudonymized,
            search_by_identifier: self.search_by_identifier || other.search_by_identifier,
            read_opposed_patients: self.read_opposed_patients || other.read_opposed_patients,
            export_csv_nominative: self.export_csv_nominative || other.export_csv_nominative,
            export_csv_pseudonymized: self.export_csv_pseudonymized
                || other.export_csv_pseudonymized,
            export_jupyter_nominative: self.export_jupyter_nominative
                || other.export_jupyter_nominative,
            export_jupyter_pseudonymized: self.export_jupyter_pseudonymized
                || other.export_jupyter_pseudonymized,
        }
    }
}

/// Rights of the acting user on one target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRights {
    pub org_node_id: Uuid,
    #[serde(flatten)]
    pub flags: RightFlags,
}

impl DataRights {
    pub fn none(org_node_id: Uuid) -> Self {
        Self {
            org_node_id,
            flags: RightFlags::default(),
        }
    }
}

/// Rights of the acting user over a whole target set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRights {
    pub mode: AggregationMode,
    pub target_count: usize,
    #[serde(flatten)]
    pub flags: RightFlags,
}

/// A node the user can read, after redundancy reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadableNode {
    pub org_node_id: Uuid,
    pub strength: ReadStrength,
}
