//! Checks run before a grant is created or edited.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::error::RightsError;
use crate::models::{Access, AccessWindow};

/// Validate a requested window against `now`.
///
/// `existing` is the grant being edited, or `None` on creation. Past
/// instants are accepted within `tolerance` of `now`.
pub fn validate_access_window(
    requested: &AccessWindow,
    existing: Option<&Access>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), RightsError> {
    if requested.start_utc > requested.end_utc {
        return Err(RightsError::InvalidTemporalInput(format!(
            "start {} is after end {}",
            requested.start_utc, requested.end_utc
        )));
    }

    let earliest = now - tolerance;

    match existing {
        None => {
            if requested.start_utc < earliest {
                return Err(RightsError::InvalidTemporalInput(format!(
                    "start {} is in the past",
                    requested.start_utc
                )));
            }
            if requested.end_utc < earliest {
                return Err(RightsError::InvalidTemporalInput(format!(
                    "end {} is in the past",
                    requested.end_utc
                )));
            }
        }
        Some(access) => {
            if requested.start_utc != access.start_utc {
                if access.has_started_at(now) {
                    return Err(RightsError::InvalidTemporalInput(format!(
                        "access {} has already started",
                        access.access_id
                    )));
                }
                if requested.start_utc < earliest {
                    return Err(RightsError::InvalidTemporalInput(format!(
                        "start {} is in the past",
                        requested.start_utc
                    )));
                }
            }
            if requested.end_utc != access.closing_utc() {
                if access.closing_utc() <= now {
                    return Err(RightsError::InvalidTemporalInput(format!(
                        "access {} has already ended",
                        access.access_id
                    )));
                }
                if requested.end_utc < earliest {
                    return Err(RightsError::InvalidTemporalInput(format!(
                        "end {} is in the past",
                        requested.end_utc
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Reject a window that overlaps a non-closed grant of the same profile,
/// role and node.
///
/// `editing` names a grant to leave out of the comparison.
pub fn ensure_no_overlap(
    profile_id: Uuid,
    org_node_id: Uuid,
    role_id: Uuid,
    window: &AccessWindow,
    existing: &[Access],
    editing: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), RightsError> {
    let clash = existing.iter().find(|access| {
        Some(access.access_id) != editing
            && access.profile_id == profile_id
            && access.role_id == role_id
            && access.org_node_id == Some(org_node_id)
            && !access.is_closed_at(now)
            && access.window().overlaps(window)
    });

    match clash {
        Some(access) => Err(RightsError::OverlappingAccess {
            existing_access_id: access.access_id,
            profile_id,
            org_node_id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skew() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let now = Utc::now();
        let window = AccessWindow::new(now + Duration::days(2), now + Duration::days(1));
        let err = validate_access_window(&window, None, now, skew()).unwrap_err();
        assert!(matches!(err, RightsError::InvalidTemporalInput(_)));
    }

    #[test]
    fn test_new_window_within_tolerance_is_accepted() {
        let now = Utc::now();
        let window = AccessWindow::new(now - Duration::seconds(30), now + Duration::days(1));
        assert!(validate_access_window(&window, None, now, skew()).is_ok());
    }

    #[test]
    fn test_new_window_in_the_past_is_rejected() {
        let now = Utc::now();
        let window = AccessWindow::new(now - Duration::hours(1), now + Duration::days(1));
        assert!(validate_access_window(&window, None, now, skew()).is_err());
    }

    #[test]
    fn test_started_access_keeps_its_start() {
        let now = Utc::now();
        let access = Access::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now - Duration::days(1),
            now + Duration::days(1),
        );

        let moved = AccessWindow::new(now + Duration::hours(1), access.end_utc);
        assert!(validate_access_window(&moved, Some(&access), now, skew()).is_err());

        let extended = AccessWindow::new(access.start_utc, now + Duration::days(30));
        assert!(validate_access_window(&extended, Some(&access), now, skew()).is_ok());
    }

    #[test]
    fn test_ended_access_keeps_its_end() {
        let now = Utc::now();
        let mut access = Access::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now - Duration::days(10),
            now + Duration::days(1),
        );
        access.manual_end_utc = Some(now - Duration::days(1));

        let reopened = AccessWindow::new(access.start_utc, now + Duration::days(5));
        assert!(validate_access_window(&reopened, Some(&access), now, skew()).is_err());
    }

    #[test]
    fn test_overlap_on_same_triple_is_rejected() {
        let now = Utc::now();
        let access = Access::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now - Duration::days(1),
            now + Duration::days(10),
        );
        let node_id = access.org_node_id.unwrap();
        let window = AccessWindow::new(now + Duration::days(5), now + Duration::days(20));

        let err = ensure_no_overlap(
            access.profile_id,
            node_id,
            access.role_id,
            &window,
            std::slice::from_ref(&access),
            None,
            now,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RightsError::OverlappingAccess { existing_access_id, .. } if existing_access_id == access.access_id
        ));

        assert!(ensure_no_overlap(
            access.profile_id,
            node_id,
            Uuid::new_v4(),
            &window,
            std::slice::from_ref(&access),
            None,
            now,
        )
        .is_ok());

        assert!(ensure_no_overlap(
            access.profile_id,
            node_id,
            access.role_id,
            &window,
            std::slice::from_ref(&access),
            Some(access.access_id),
            now,
        )
        .is_ok());
    }
}
