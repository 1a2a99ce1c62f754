//! Hierarchy-scoped rights resolution over a care-site tree.
//!
//! Given a user's valid grants, the engine answers which top nodes the user
//! manages or reads, what patient-data rights hold on a set of target nodes,
//! and whether the user may assign a role on a node.

pub mod config;
pub mod db;
pub mod models;
pub mod services;

pub use services::{RightsEngine, RightsError};
