//! One-shot pass that closes the grants left on deleted nodes.

use chrono::Utc;
use rights_service::{config::RightsConfig, db, services::PgStore, RightsEngine};
use service_core::error::AppError;
use service_core::observability::logging::{init_tracing, shutdown_tracing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = RightsConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.common.log_format,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access closing pass"
    );

    let result = run(&config).await;
    match &result {
        Ok(closed) => tracing::info!(closed, "Access closing pass finished"),
        Err(e) => tracing::error!(error = %e, code = e.code(), "Access closing pass failed"),
    }

    shutdown_tracing();
    result.map(|_| ())
}

async fn run(config: &RightsConfig) -> Result<u64, AppError> {
    let pool = db::connect(&config.database).await?;
    let store = Arc::new(PgStore::new(pool));
    let engine = RightsEngine::from_store(store.clone(), config.engine.clone());

    let now = Utc::now();
    let node_ids = store.deleted_nodes_with_open_accesses(now).await?;
    tracing::info!(nodes = node_ids.len(), "Found deleted nodes with open accesses");

    Ok(engine.close_accesses_for_nodes(&node_ids, now).await?)
}
