use chrono::Utc;
use log::error;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use super::coordinator::CutCoordinator;

/// Spawn the recurring background pass that expires overdue cuts.
///
/// Runs independently of request handling; every transition it makes goes
/// through the same per-item store transaction as direct acknowledgments.
pub fn spawn_sweeper(coordinator: CutCoordinator, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = coordinator.expire_sweep(Utc::now()).await {
                error!("Expiry sweep failed: {}", e);
            }
        }
    })
}
