//! Role model - named capability sets and the managing power they require.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::capability::{Capability, CapabilityFamily, CapabilitySet};

/// Role entity with its resolved capability set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub role_id: Uuid,
    pub role_label: String,
    pub capabilities: CapabilitySet,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new role.
    pub fn new(role_label: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            role_label: role_label.into(),
            capabilities,
            created_utc: Utc::now(),
        }
    }

    /// Managing power needed to assign, edit or view grants of this role.
    pub fn requirements(&self) -> RoleRequirements {
        RoleRequirements::of(&self.capabilities)
    }
}

/// Role row as stored: one boolean column per capability.
#[derive(Debug, Clone, FromRow)]
pub struct RoleRow {
    pub role_id: Uuid,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
    pub right_full_admin: bool,
    pub right_read_logs: bool,
    pub right_manage_users: bool,
    pub right_read_users: bool,
    pub right_manage_roles: bool,
    pub right_manage_admin_accesses_same_level: bool,
    pub right_read_admin_accesses_same_level: bool,
    pub right_manage_admin_accesses_inferior_levels: bool,
    pub right_read_admin_accesses_inferior_levels: bool,
    pub right_manage_data_accesses_same_level: bool,
    pub right_read_data_accesses_same_level: bool,
    pub right_manage_data_accesses_inferior_levels: bool,
    pub right_read_data_accesses_inferior_levels: bool,
    pub right_manage_export_csv_accesses: bool,
    pub right_manage_export_jupyter_accesses: bool,
    pub right_read_patient_nominative: bool,
    pub right_read_patient_pseudonymized: bool,
    pub right_search_patient_with_ipp: bool,
    pub right_read_opposed_patients_data: bool,
    pub right_export_csv_nominative: bool,
    pub right_export_csv_pseudonymized: bool,
    pub right_export_jupyter_nominative: bool,
    pub right_export_jupyter_pseudonymized: bool,
}

impl RoleRow {
    fn flag(&self, cap: Capability) -> bool {
        match cap {
            Capability::FullAdmin => self.right_full_admin,
            Capability::ReadLogs => self.right_read_logs,
            Capability::ManageUsers => self.right_manage_users,
            Capability::ReadUsers => self.right_read_users,
            Capability::ManageRoles => self.right_manage_roles,
            Capability::ManageAdminAccessesSameLevel => self.right_manage_admin_accesses_same_level,
            Capability::ReadAdminAccessesSameLevel => self.right_read_admin_accesses_same_level,
            Capability::ManageAdminAccessesInferiorLevels => {
                self.right_manage_admin_accesses_inferior_levels
            }
            Capability::ReadAdminAccessesInferiorLevels => {
                self.right_read_admin_accesses_inferior_levels
            }
            Capability::ManageDataAccessesSameLevel => self.right_manage_data_accesses_same_level,
            Capability::ReadDataAccessesSameLevel => self.right_read_data_accesses_same_level,
            Capability::ManageDataAccessesInferiorLevels => {
                self.right_manage_data_accesses_inferior_levels
            }
            Capability::ReadDataAccessesInferiorLevels => {
                self.right_read_data_accesses_inferior_levels
            }
            Capability::ManageExportCsvAccesses => self.right_manage_export_csv_accesses,
            Capability::ManageExportJupyterAccesses => self.right_manage_export_jupyter_accesses,
            Capability::ReadPatientNominative => self.right_read_patient_nominative,
            Capability::ReadPatientPseudonymized => self.right_read_patient_pseudonymized,
            Capability::SearchPatientWithIdentifier => self.right_search_patient_with_ipp,
            Capability::ReadOpposedPatientsData => self.right_read_opposed_patients_data,
            Capability::ExportCsvNominative => self.right_export_csv_nominative,
            Capability::ExportCsvPseudonymized => self.right_export_csv_pseudonymized,
            Capability::ExportJupyterNominative => self.right_export_jupyter_nominative,
            Capability::ExportJupyterPseudonymized => self.right_export_jupyter_pseudonymized,
        }
    }
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        let capabilities = Capability::ALL
            .iter()
            .copied()
            .filter(|cap| row.flag(*cap))
            .collect();
        Self {
            role_id: row.role_id,
            role_label: row.role_label,
            capabilities,
            created_utc: row.created_utc,
        }
    }
}

/// Which managing power a role demands from whoever assigns it.
///
/// Administration is layered: full admins manage admin-grant managers,
/// admin-grant managers manage data-grant managers, and data-grant managers
/// manage data readers. Export rights are managed on their own axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleRequirements {
    pub full_admin: bool,
    pub admin_accesses_manager: bool,
    pub data_accesses_manager: bool,
    pub export_csv_manager: bool,
    pub export_jupyter_manager: bool,
}

impl RoleRequirements {
    pub fn of(caps: &CapabilitySet) -> Self {
        let needs_full_admin = caps.iter().any(|cap| {
            matches!(
                cap,
                Capability::FullAdmin
                    | Capability::ReadLogs
                    | Capability::ManageUsers
                    | Capability::ReadUsers
                    | Capability::ManageRoles
                    | Capability::ManageAdminAccessesSameLevel
                    | Capability::ReadAdminAccessesSameLevel
                    | Capability::ManageAdminAccessesInferiorLevels
                    | Capability::ReadAdminAccessesInferiorLevels
                    | Capability::ManageExportCsvAccesses
                    | Capability::ManageExportJupyterAccesses
            )
        });
        let needs_admin_manager = caps.iter().any(|cap| {
            matches!(
                cap,
                Capability::ManageDataAccessesSameLevel
                    | Capability::ReadDataAccessesSameLevel
                    | Capability::ManageDataAccessesInferiorLevels
                    | Capability::ReadDataAccessesInferiorLevels
            )
        });

        Self {
            full_admin: needs_full_admin,
            admin_accesses_manager: needs_admin_manager,
            data_accesses_manager: !caps.family(CapabilityFamily::DataReading).is_empty(),
            export_csv_manager: caps.contains(Capability::ExportCsvNominative)
                || caps.contains(Capability::ExportCsvPseudonymized),
            export_jupyter_manager: caps.contains(Capability::ExportJupyterNominative)
                || caps.contains(Capability::ExportJupyterPseudonymized),
        }
    }
}
