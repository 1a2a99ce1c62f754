//! Rights resolution services.
//!
//! Store seams and their adapters, the pure resolution algorithms, and the
//! engine that ties them to a snapshot per request.

pub mod cache;
mod engine;
pub mod error;
pub mod hierarchy;
pub mod management;
pub mod memory;
pub mod postgres;
pub mod rights;
pub mod store;
pub mod top_nodes;
pub mod validation;
pub mod validity;

pub use cache::CapabilityCache;
pub use engine::RightsEngine;
pub use error::RightsError;
pub use hierarchy::{HierarchySnapshot, NodeStatus};
pub use management::ManagementPowers;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use rights::{ReadingPolicy, ReadingResolution};
pub use store::{GrantStore, NodeDirectory, RoleCatalog};
pub use top_nodes::{ScopedNode, TopNodeReduction};
pub use validation::{ensure_no_overlap, validate_access_window};
pub use validity::is_access_valid;
