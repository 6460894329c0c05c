//! Periodic eviction of old requests from the ledger.
//!
//! Entries are removed purely by age, whatever their status, so a request
//! that is still running past the retention period disappears as well.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::ledger::RequestLedger;

/// Default retention period: 2 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(2 * 60 * 60);

/// Default sweep interval: 2 hours.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Run the eviction loop until `cancel` is triggered.
///
/// The first sweep happens immediately, then once per `interval`.
pub async fn run(
    ledger: Arc<RequestLedger>,
    interval: Duration,
    retention: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Request retention job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Request retention job stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = ledger.sweep(Utc::now(), retention).await;
                if removed == 0 {
                    tracing::debug!("Request retention: nothing to evict");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::knight_wizard_brief;

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let ledger = Arc::new(RequestLedger::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            ledger,
            Duration::from_secs(3600),
            DEFAULT_RETENTION,
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("retention loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_tick_evicts_expired_entries() {
        let ledger = Arc::new(RequestLedger::new());
        let stale = ledger
            .create_at(knight_wizard_brief(), Utc::now() - chrono::Duration::hours(3))
            .await
            .id;
        let fresh = ledger.create(knight_wizard_brief()).await.id;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            ledger.clone(),
            Duration::from_secs(3600),
            DEFAULT_RETENTION,
            cancel.clone(),
        ));

        for _ in 0..100 {
            if ledger.get(stale).await.is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert!(ledger.get(stale).await.is_none());
        assert!(ledger.get(fresh).await.is_some());
    }
}
