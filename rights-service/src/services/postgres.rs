//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::error::RightsError;
use super::store::{GrantStore, NodeDirectory, RoleCatalog};
use crate::models::{Access, OrgNode, Profile, Role, RoleRow, User};

/// Store over the `org_nodes`, `roles`, `users`, `profiles` and `accesses` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Nodes that are deleted, or sit under a deleted node, and still carry
    /// an access that is not closed at `now`.
    pub async fn deleted_nodes_with_open_accesses(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RightsError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT n.org_node_id
            FROM org_nodes n
            JOIN accesses a ON a.org_node_id = n.org_node_id
            WHERE (
                n.deleted_utc IS NOT NULL
                OR EXISTS (
                    SELECT 1 FROM org_nodes p
                    WHERE p.org_node_id = ANY(n.above_level_ids)
                      AND p.deleted_utc IS NOT NULL
                )
            )
              AND (a.manual_end_utc IS NULL OR a.manual_end_utc > $1)
              AND a.end_utc > $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn insert_access(&self, access: &Access) -> Result<(), RightsError> {
        sqlx::query(
            r#"
            INSERT INTO accesses (access_id, profile_id, org_node_id, role_id, start_utc, end_utc, manual_end_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(access.access_id)
        .bind(access.profile_id)
        .bind(access.org_node_id)
        .bind(access.role_id)
        .bind(access.start_utc)
        .bind(access.end_utc)
        .bind(access.manual_end_utc)
        .bind(access.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_access(&self, access_id: Uuid) -> Result<Option<Access>, RightsError> {
        let access = sqlx::query_as::<_, Access>("SELECT * FROM accesses WHERE access_id = $1")
            .bind(access_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(access)
    }
}

#[async_trait]
impl NodeDirectory for PgStore {
    async fn get(&self, node_id: Uuid) -> Result<Option<OrgNode>, RightsError> {
        let node = sqlx::query_as::<_, OrgNode>("SELECT * FROM org_nodes WHERE org_node_id = $1")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(node)
    }

    async fn get_many(&self, node_ids: &[Uuid]) -> Result<Vec<OrgNode>, RightsError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let nodes =
            sqlx::query_as::<_, OrgNode>("SELECT * FROM org_nodes WHERE org_node_id = ANY($1)")
                .bind(node_ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(nodes)
    }

    async fn children(&self, node_id: Uuid) -> Result<Vec<Uuid>, RightsError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT org_node_id FROM org_nodes
            WHERE parent_org_node_id = $1 AND deleted_utc IS NULL
            ORDER BY org_node_id
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn deleted_node_ids(&self) -> Result<Vec<Uuid>, RightsError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT org_node_id FROM org_nodes WHERE deleted_utc IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn generation(&self) -> Result<u64, RightsError> {
        let generation = sqlx::query_scalar::<_, i64>(
            "SELECT generation_val FROM tree_sync WHERE sync_id = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or(0);
        u64::try_from(generation)
            .map_err(|_| RightsError::Internal(format!("negative tree generation {}", generation)))
    }
}

#[async_trait]
impl GrantStore for PgStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RightsError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn profiles_for_user(&self, user_id: Uuid) -> Result<Vec<Profile>, RightsError> {
        let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(profiles)
    }

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, RightsError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn accesses_for_profiles(
        &self,
        profile_ids: &[Uuid],
    ) -> Result<Vec<Access>, RightsError> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }
        let accesses =
            sqlx::query_as::<_, Access>("SELECT * FROM accesses WHERE profile_id = ANY($1)")
                .bind(profile_ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(accesses)
    }

    async fn close_accesses_for_nodes(
        &self,
        node_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RightsError> {
        // A single statement, so the closure applies fully or not at all.
        let result = sqlx::query(
            r#"
            UPDATE accesses
            SET manual_end_utc = $2
            WHERE (org_node_id = ANY($1) OR org_node_id IS NULL)
              AND (manual_end_utc IS NULL OR manual_end_utc > $2)
              AND end_utc > $2
            "#,
        )
        .bind(node_ids)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RoleCatalog for PgStore {
    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, RightsError> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Role::from))
    }
}
