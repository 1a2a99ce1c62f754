//! Access model - time-bounded profile→node→role grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::capability::CapabilitySet;

/// Access entity (a grant).
///
/// Closed accesses are kept for audit; they never come back to life.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Access {
    pub access_id: Uuid,
    pub profile_id: Uuid,
    pub org_node_id: Option<Uuid>,
    pub role_id: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub manual_end_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Access {
    /// Create a new access over the given window.
    pub fn new(
        profile_id: Uuid,
        org_node_id: Uuid,
        role_id: Uuid,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            access_id: Uuid::new_v4(),
            profile_id,
            org_node_id: Some(org_node_id),
            role_id,
            start_utc,
            end_utc,
            manual_end_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// The instant the access stops applying: manual end if set, else end.
    pub fn closing_utc(&self) -> DateTime<Utc> {
        self.manual_end_utc.unwrap_or(self.end_utc)
    }

    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        self.start_utc <= now
    }

    /// Closed by its window, by an administrative early end, or by losing its node.
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.org_node_id.is_none() || self.closing_utc() <= now
    }

    /// Started and not closed. Profile validity is checked separately.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.has_started_at(now) && !self.is_closed_at(now)
    }

    pub fn window(&self) -> AccessWindow {
        AccessWindow {
            start_utc: self.start_utc,
            end_utc: self.closing_utc(),
        }
    }
}

/// A valid access joined with its node and its role's capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub access_id: Uuid,
    pub org_node_id: Uuid,
    pub role_id: Uuid,
    pub capabilities: CapabilitySet,
}

/// Requested start/end of an access being created or edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl AccessWindow {
    pub fn new(start_utc: DateTime<Utc>, end_utc: DateTime<Utc>) -> Self {
        Self { start_utc, end_utc }
    }

    /// Half-open intervals `[start, end)` overlap.
    pub fn overlaps(&self, other: &AccessWindow) -> bool {
        self.start_utc < other.end_utc && other.start_utc < self.end_utc
    }
}

/// Request to create an access.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccessRequest {
    pub profile_id: Uuid,
    pub org_node_id: Uuid,
    pub role_id: Uuid,
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: DateTime<Utc>,
}
