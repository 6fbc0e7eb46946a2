//! Recurring assignment pass. An explicit service with `start`/`stop`
//! owned by the composition root; ticks are independent, and a tick
//! overlapping a manual edit is resolved by the per-ticket eligibility
//! re-check inside the engine.

use chrono::Utc;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::engine::TicketEngine;

pub struct AssignmentScheduler {
    engine: Arc<TicketEngine>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl AssignmentScheduler {
    pub fn new(engine: Arc<TicketEngine>) -> Self {
        Self {
            engine,
            handle: RwLock::new(None),
        }
    }

    /// Spawns the recurring pass. Calling `start` on a running scheduler
    /// replaces the previous timer.
    pub async fn start(&self, interval: Duration) {
        let engine = self.engine.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match engine.run_assignment_pass(Utc::now()).await {
                    Ok(0) => {}
                    Ok(assigned) => info!("assignment pass assigned {assigned} ticket(s)"),
                    Err(e) => error!("assignment pass failed: {e}"),
                }
            }
        });
        let mut handle = self.handle.write().await;
        if let Some(previous) = handle.replace(task) {
            previous.abort();
        }
        info!("assignment scheduler started ({}s interval)", interval.as_secs());
    }

    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(task) = handle.take() {
            task.abort();
            info!("assignment scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
