use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A human user; owns one or more profiles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub display_name: String,
    /// User-level unrestricted patient-data reading, independent of any grant.
    pub unrestricted_data_read: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            display_name: display_name.into(),
            unrestricted_data_read: false,
            created_utc: Utc::now(),
        }
    }
}
