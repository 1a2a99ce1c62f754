//! Profile model - identity bindings of a user with their own validity window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a profile comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    Manual,
    Synchronized,
}

impl ProfileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileSource::Manual => "manual",
            ProfileSource::Synchronized => "synchronized",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "synchronized" => ProfileSource::Synchronized,
            _ => ProfileSource::Manual,
        }
    }
}

/// Profile entity.
///
/// Every `manual_*` field overrides its plain counterpart when set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub source_code: String,
    pub active_flag: Option<bool>,
    pub valid_start_utc: Option<DateTime<Utc>>,
    pub valid_end_utc: Option<DateTime<Utc>>,
    pub manual_active_flag: Option<bool>,
    pub manual_valid_start_utc: Option<DateTime<Utc>>,
    pub manual_valid_end_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Profile {
    /// Create an active, unbounded profile.
    pub fn new(user_id: Uuid, source: ProfileSource) -> Self {
        Self {
            profile_id: Uuid::new_v4(),
            user_id,
            source_code: source.as_str().to_string(),
            active_flag: Some(true),
            valid_start_utc: None,
            valid_end_utc: None,
            manual_active_flag: None,
            manual_valid_start_utc: None,
            manual_valid_end_utc: None,
            created_utc: Utc::now(),
        }
    }

    pub fn source(&self) -> ProfileSource {
        ProfileSource::parse(&self.source_code)
    }

    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.manual_valid_start_utc.or(self.valid_start_utc)
    }

    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.manual_valid_end_utc.or(self.valid_end_utc)
    }

    /// An unset flag on both sides counts as inactive.
    pub fn effective_active(&self) -> bool {
        self.manual_active_flag.or(self.active_flag).unwrap_or(false)
    }

    /// Check if the profile is valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_active()
            && self.effective_start().is_none_or(|start| start <= now)
            && self.effective_end().is_none_or(|end| end > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_profile_is_valid() {
        let profile = Profile::new(Uuid::new_v4(), ProfileSource::Manual);
        assert!(profile.is_valid_at(Utc::now()));
        assert_eq!(profile.source(), ProfileSource::Manual);
    }

    #[test]
    fn test_manual_flag_overrides_active() {
        let mut profile = Profile::new(Uuid::new_v4(), ProfileSource::Synchronized);
        profile.active_flag = Some(false);
        profile.manual_active_flag = Some(true);
        assert!(profile.is_valid_at(Utc::now()));

        profile.active_flag = Some(true);
        profile.manual_active_flag = Some(false);
        assert!(!profile.is_valid_at(Utc::now()));
    }

    #[test]
    fn test_unset_active_is_invalid() {
        let mut profile = Profile::new(Uuid::new_v4(), ProfileSource::Manual);
        profile.active_flag = None;
        assert!(!profile.is_valid_at(Utc::now()));
    }

    #[test]
    fn test_manual_window_overrides_window() {
        let now = Utc::now();
        let mut profile = Profile::new(Uuid::new_v4(), ProfileSource::Synchronized);
        profile.valid_end_utc = Some(now - Duration::days(1));
        assert!(!profile.is_valid_at(now));

        profile.manual_valid_end_utc = Some(now + Duration::days(30));
        assert!(profile.is_valid_at(now));

        profile.manual_valid_start_utc = Some(now + Duration::days(1));
        assert!(!profile.is_valid_at(now));
    }

    #[test]
    fn test_end_bound_is_exclusive() {
        let now = Utc::now();
        let mut profile = Profile::new(Uuid::new_v4(), ProfileSource::Manual);
        profile.valid_end_utc = Some(now);
        assert!(!profile.is_valid_at(now));
        profile.valid_start_utc = Some(now - Duration::seconds(1));
        profile.valid_end_utc = Some(now + Duration::seconds(1));
        assert!(profile.is_valid_at(now));
    }
}
