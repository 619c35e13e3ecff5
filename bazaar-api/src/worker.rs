use std::time::Duration;

use bazaar_core::TrackingStatus;
use bazaar_order::SyncOutcome;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::state::AppState;

/// Background sweep: pulls courier status for recent in-flight orders and
/// drops online checkouts the customer never finished.
pub async fn start_reconcile_worker(
    state: AppState,
    every: Duration,
    batch_size: usize,
    checkout_ttl: chrono::Duration,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = every.as_secs(), batch_size, "Reconcile worker started");

    loop {
        ticker.tick().await;

        let purged = state.checkout.purge_expired(checkout_ttl);
        if purged > 0 {
            info!(purged, "Dropped abandoned checkouts");
        }

        if let Err(e) = sweep(&state, batch_size).await {
            error!("Reconcile sweep failed: {}", e);
        }
    }
}

/// One pass. Returns how many orders moved.
pub async fn sweep(state: &AppState, batch_size: usize) -> Result<usize, bazaar_order::OrderError> {
    let candidates: Vec<_> = state
        .orders
        .recent_orders(batch_size)
        .await?
        .into_iter()
        .filter(|o| o.awb_code.is_some())
        .filter(|o| !matches!(o.tracking_status, TrackingStatus::Delivered | TrackingStatus::Cancelled))
        .collect();

    let mut advanced = 0;
    for (order_id, result) in state.reconciler.sync_many(&candidates).await {
        match result {
            Ok(SyncOutcome::Advanced { from, to }) => {
                info!(order_id = %order_id, from = %from, to = %to, "Sweep advanced order");
                advanced += 1;
            }
            Ok(_) => {}
            Err(e) => error!(order_id = %order_id, error = %e, "Sweep could not sync order"),
        }
    }
    Ok(advanced)
}
