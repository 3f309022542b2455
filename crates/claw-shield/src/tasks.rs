//! Background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::AlertStream;
use crate::shield::BruteForceShield;

/// Drain alerts into the log until the task is aborted.
pub fn spawn_alert_logger(mut alerts: AlertStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let alert = alerts.recv().await;
            warn!(
                kind = ?alert.kind,
                address = %alert.address,
                raised_at = %alert.raised_at,
                "Security alert: {}",
                alert.message
            );
        }
    })
}

/// Periodically compact the shield's ledger until the task is aborted.
pub fn spawn_compaction(shield: Arc<BruteForceShield>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = shield.compact();
            debug!(removed = removed, "Compaction pass finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ShieldConfig;

    #[tokio::test]
    async fn test_alert_logger_drains_queue() {
        let shield = BruteForceShield::with_defaults();
        let alerts = shield.subscribe_notifications().unwrap();
        let handle = spawn_alert_logger(alerts);

        shield.record_failed_attempt("1.2.3.4", "administrator");
        assert_eq!(shield.stats().alerts_published, 2);

        for _ in 0..200 {
            if shield.stats().alerts_pending == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(shield.stats().alerts_pending, 0);

        handle.abort();
        let _ = handle.await;

        // The stream was dropped with the task, so a new consumer may attach.
        assert!(shield.subscribe_notifications().is_ok());
    }

    #[tokio::test]
    async fn test_compaction_task_runs() {
        let clock = Arc::new(ManualClock::new());
        let config = ShieldConfig::builder()
            .idle_retention(Duration::from_secs(60))
            .build();
        let shield = Arc::new(BruteForceShield::with_clock(config, clock.clone()).unwrap());

        shield.record_failed_attempt("1.2.3.4", "bob");
        clock.advance(Duration::from_secs(120));
        assert_eq!(shield.stats().tracked_addresses, 1);

        let handle = spawn_compaction(Arc::clone(&shield), Duration::from_millis(10));
        for _ in 0..200 {
            if shield.stats().tracked_addresses == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.abort();

        assert_eq!(shield.stats().tracked_addresses, 0);
    }
}
