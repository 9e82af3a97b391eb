// [apps/orchestrator/src/main.rs]
//! Binary entry point: load configuration, connect the store (which
//! self-migrates on first connect), wire the dependency graph, spawn
//! the background sweepers, and serve the HTTP surface.

use std::sync::Arc;

use nebula_orchestrator::config::Config;
use nebula_orchestrator::routes::build_router;
use nebula_orchestrator::services::heartbeat_monitor::{spawn_missed_heartbeat_sweeper, spawn_retention_sweeper};
use nebula_orchestrator::services::rebalancer::spawn_rebalancer_loop;
use nebula_orchestrator::services::reaper::spawn_reaper;
use nebula_orchestrator::services::scheduler::spawn_scheduler_loop;
use nebula_orchestrator::state::AppState;
use nebula_infra_db::TursoClient;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nebula_shared_observability::init_tracing("orchestrator");

    let config = Arc::new(Config::load()?);
    info!(bind = %config.server.bind_address, port = config.server.port, "loading configuration complete");

    let db = Arc::new(TursoClient::connect(&config.database.url, config.database.auth_token.clone()).await?);
    let state = AppState::new(config.clone(), db.clone());

    spawn_scheduler_loop(state.scheduler.clone(), config.clone()).await;
    spawn_rebalancer_loop(state.rebalancer.clone(), config.clone()).await;
    spawn_missed_heartbeat_sweeper(state.heartbeat_monitor.clone(), config.clone()).await;
    spawn_retention_sweeper(db.clone(), config.clone()).await;
    spawn_reaper(db.clone(), state.event_bus.clone()).await;

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind((config.server.bind_address.as_str(), config.server.port)).await?;
    info!(address = %listener.local_addr()?, "orchestrator listening");

    axum::serve(listener, router).await?;
    Ok(())
}
