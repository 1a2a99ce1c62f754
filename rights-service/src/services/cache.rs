//! Time-bounded memo of role capabilities.
//!
//! Entries expire after the configured TTL and the whole cache is dropped
//! when the tree generation moves.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use super::error::RightsError;
use super::store::RoleCatalog;
use crate::models::{CapabilitySet, RoleRequirements};

#[derive(Clone, Copy)]
struct CachedRole {
    capabilities: CapabilitySet,
    loaded_at: Instant,
}

pub struct CapabilityCache {
    entries: DashMap<Uuid, CachedRole>,
    ttl: Duration,
    generation: AtomicU64,
}

impl CapabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Drop every entry if `generation` differs from the last one seen.
    pub fn observe_generation(&self, generation: u64) {
        let previous = self.generation.swap(generation, Ordering::SeqCst);
        if previous != generation {
            debug!(previous, generation, "Tree generation moved, clearing capability cache");
            self.entries.clear();
        }
    }

    /// Capabilities of `role_id`, loading through `catalog` on miss or expiry.
    pub async fn capabilities(
        &self,
        catalog: &dyn RoleCatalog,
        role_id: Uuid,
    ) -> Result<CapabilitySet, RightsError> {
        if let Some(entry) = self.entries.get(&role_id) {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(entry.capabilities);
            }
        }

        let capabilities = catalog.capabilities(role_id).await?;
        self.entries.insert(
            role_id,
            CachedRole {
                capabilities,
                loaded_at: Instant::now(),
            },
        );
        Ok(capabilities)
    }

    pub async fn requirements(
        &self,
        catalog: &dyn RoleCatalog,
        role_id: Uuid,
    ) -> Result<RoleRequirements, RightsError> {
        let capabilities = self.capabilities(catalog, role_id).await?;
        Ok(RoleRequirements::of(&capabilities))
    }

    pub fn invalidate(&self, role_id: Uuid) {
        self.entries.remove(&role_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
