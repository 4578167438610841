use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use application::usecases::{
    expiry_sweep::ExpirySweepUseCase, renewal_reminders::RenewalReminderUseCase,
};

/// Runs both billing sweeps forever on a fixed cadence. Each sweep is
/// re-entrant, so a long iteration overlapping the next tick is harmless;
/// a failed iteration is logged and retried on the next tick.
pub async fn run_sweep_loop(
    expiry_sweep: Arc<ExpirySweepUseCase>,
    renewal_reminders: Arc<RenewalReminderUseCase>,
    interval: Duration,
) -> Result<()> {
    loop {
        let now = Utc::now();

        match expiry_sweep.run(now).await {
            Ok(result) => info!(
                scanned = result.scanned,
                expired = result.expired,
                downgraded = result.downgraded,
                errored = result.errored,
                "sweep_loop: expiry sweep finished"
            ),
            Err(e) => error!("Error while running expiry sweep: {}", e),
        }

        match renewal_reminders.run(now).await {
            Ok(result) => info!(
                scanned = result.scanned,
                sent = result.sent,
                errored = result.errored,
                "sweep_loop: renewal reminder sweep finished"
            ),
            Err(e) => error!("Error while running renewal reminder sweep: {}", e),
        }

        tokio::time::sleep(interval).await;
    }
}
