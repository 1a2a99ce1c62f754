//! Grant validity at an instant.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Access, Profile};

/// An access is valid when its profile is valid, it has started and it is
/// not closed.
pub fn is_access_valid(access: &Access, profile: &Profile, now: DateTime<Utc>) -> bool {
    access.profile_id == profile.profile_id && profile.is_valid_at(now) && access.is_open_at(now)
}

/// Keep the accesses that are valid at `now`.
///
/// Accesses whose profile is not among `profiles` are dropped.
pub fn filter_valid(accesses: Vec<Access>, profiles: &[Profile], now: DateTime<Utc>) -> Vec<Access> {
    let by_id: HashMap<Uuid, &Profile> = profiles.iter().map(|p| (p.profile_id, p)).collect();
    accesses
        .into_iter()
        .filter(|access| {
            by_id
                .get(&access.profile_id)
                .is_some_and(|profile| is_access_valid(access, profile, now))
        })
        .collect()
}
