//! Periodic flush trigger
//!
//! A background tokio task that flushes on a fixed interval and drains the
//! buffer one last time when shut down. A failed flush is only logged; the next
//! tick proceeds as usual.

use crate::flush::{FlushCoordinator, FlushReport};
use crate::store::PriceStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Spawns the flush loop
pub struct FlushScheduler;

impl FlushScheduler {
    /// Start flushing every `period`. The first flush happens one full period
    /// after spawning, not immediately.
    pub fn spawn(
        coordinator: Arc<FlushCoordinator>,
        store: Arc<dyn PriceStore>,
        period: Duration,
    ) -> SchedulerHandle {
        let period = period.max(MIN_PERIOD);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(period_secs = period.as_secs_f64(), "flush scheduler started");
        let task = tokio::spawn(run(coordinator, store, period, shutdown_rx));

        SchedulerHandle {
            shutdown_tx,
            task,
        }
    }
}

/// Owner of a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<FlushReport>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the final drain. Returns its report, or
    /// `None` if the scheduler task died.
    pub async fn shutdown(self) -> Option<FlushReport> {
        // Receiver gone means the task already exited; join handles that
        let _ = self.shutdown_tx.send(true);

        match self.task.await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "flush scheduler task failed");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run(
    coordinator: Arc<FlushCoordinator>,
    store: Arc<dyn PriceStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> FlushReport {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = coordinator.flush(store.as_ref()).await;
                if report.is_rolled_back() {
                    warn!("scheduled flush failed, continuing with next interval");
                } else {
                    debug!(rows = report.rows_touched, "scheduled flush done");
                }
            }
            changed = shutdown.changed() => {
                // A dropped handle also stops the loop
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("flush scheduler stopping, draining buffer");
    let report = coordinator.flush(store.as_ref()).await;
    info!(rows = report.rows_touched, "final flush done");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PriceBuffer;
    use crate::fields::ItemPriceUpdate;
    use crate::flush::FlushOutcome;
    use crate::router::{PartitionSelector, PriceTable};
    use crate::store::MemoryStore;
    use types::City;

    fn setup() -> (Arc<PriceBuffer>, Arc<FlushCoordinator>, MemoryStore) {
        let buffer = Arc::new(PriceBuffer::new());
        let coordinator = Arc::new(FlushCoordinator::new(buffer.clone()));
        (buffer, coordinator, MemoryStore::new())
    }

    fn add(buffer: &PriceBuffer, key: &str) {
        buffer.add_updates(
            &PartitionSelector::new("eu", "fast"),
            vec![ItemPriceUpdate::new(key).with_price(City::Caerleon, 1)],
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_on_interval() {
        let (buffer, coordinator, store) = setup();
        let handle = FlushScheduler::spawn(
            coordinator.clone(),
            Arc::new(store.clone()),
            Duration::from_secs(60),
        );

        add(&buffer, "T4_SWORD");

        // No immediate flush
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.row_count(PriceTable::ItemFastEu), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.row_count(PriceTable::ItemFastEu), 1);

        add(&buffer, "T5_SWORD");
        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.row_count(PriceTable::ItemFastEu), 2);

        handle.shutdown().await.unwrap();
        assert!(coordinator.stats().flushes >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_pending() {
        let (buffer, coordinator, store) = setup();
        let handle = FlushScheduler::spawn(
            coordinator,
            Arc::new(store.clone()),
            Duration::from_secs(3600),
        );

        add(&buffer, "T4_SWORD");
        add(&buffer, "T4_SHIELD");

        let report = handle.shutdown().await.unwrap();

        assert_eq!(report.outcome, FlushOutcome::Committed);
        assert_eq!(report.rows_touched, 2);
        assert_eq!(store.row_count(PriceTable::ItemFastEu), 2);
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_does_not_stop_scheduler() {
        let (buffer, coordinator, store) = setup();
        let handle = FlushScheduler::spawn(
            coordinator.clone(),
            Arc::new(store.clone()),
            Duration::from_secs(10),
        );

        store.set_offline(true);
        add(&buffer, "T4_SWORD");
        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(coordinator.stats().failures, 1);
        assert!(!handle.is_finished());

        store.set_offline(false);
        add(&buffer, "T5_SWORD");
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert!(store.row(PriceTable::ItemFastEu, "T4_SWORD").is_none());
        assert!(store.row(PriceTable::ItemFastEu, "T5_SWORD").is_some());

        handle.shutdown().await.unwrap();
    }
}
