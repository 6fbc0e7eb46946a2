use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use mesadesk::assignment::AssignmentScheduler;
use mesadesk::config::EngineConfig;
use mesadesk::engine::TicketEngine;
use mesadesk::store::memory::{
    MemoryAuditSink, MemoryDirectoryStore, MemoryNotificationSink, MemoryRuleStore,
    MemoryTicketStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::from_env();
    let interval = Duration::from_secs(config.assignment_interval_secs);

    let engine = Arc::new(TicketEngine::new(
        config,
        Arc::new(MemoryTicketStore::new()),
        Arc::new(MemoryRuleStore::new()),
        Arc::new(MemoryDirectoryStore::new()),
        Arc::new(MemoryAuditSink::new()),
        Arc::new(MemoryNotificationSink::new()),
    ));

    let scheduler = AssignmentScheduler::new(engine);
    scheduler.start(interval).await;
    info!("mesadesk engine up, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    scheduler.stop().await;
    info!("shutdown complete");
    Ok(())
}
