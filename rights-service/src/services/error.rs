use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RightsError {
    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Org node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("Role not found: {0}")]
    RoleNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Profile not found: {0}")]
    ProfileNotFound(Uuid),

    #[error("Access not found: {0}")]
    AccessNotFound(Uuid),

    #[error("Invalid temporal input: {0}")]
    InvalidTemporalInput(String),

    #[error("Inconsistent hierarchy at node {node_id}: {reason}")]
    InconsistentHierarchy { node_id: Uuid, reason: String },

    #[error("Overlapping access {existing_access_id} for profile {profile_id} on node {org_node_id}")]
    OverlappingAccess {
        existing_access_id: Uuid,
        profile_id: Uuid,
        org_node_id: Uuid,
    },
}

impl From<sqlx::Error> for RightsError {
    fn from(err: sqlx::Error) -> Self {
        RightsError::Database(anyhow::Error::new(err))
    }
}

impl From<RightsError> for AppError {
    fn from(err: RightsError) -> Self {
        match err {
            RightsError::Database(e) => AppError::DatabaseError(e),
            RightsError::Internal(e) => AppError::InternalError(anyhow::anyhow!(e)),
            e @ (RightsError::NodeNotFound(_)
            | RightsError::RoleNotFound(_)
            | RightsError::UserNotFound(_)
            | RightsError::ProfileNotFound(_)
            | RightsError::AccessNotFound(_)) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            RightsError::InvalidTemporalInput(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ RightsError::InconsistentHierarchy { .. } => {
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            }
            e @ RightsError::OverlappingAccess { .. } => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_not_found() {
        let app: AppError = RightsError::NodeNotFound(Uuid::nil()).into();
        assert!(matches!(app, AppError::NotFound(_)));
    }

    #[test]
    fn test_maps_temporal_to_bad_request() {
        let app: AppError = RightsError::InvalidTemporalInput("start after end".into()).into();
        assert!(matches!(app, AppError::BadRequest(_)));
        assert!(app.to_string().contains("start after end"));
    }

    #[test]
    fn test_maps_overlap_to_conflict() {
        let app: AppError = RightsError::OverlappingAccess {
            existing_access_id: Uuid::nil(),
            profile_id: Uuid::nil(),
            org_node_id: Uuid::nil(),
        }
        .into();
        assert!(matches!(app, AppError::Conflict(_)));
    }
}
