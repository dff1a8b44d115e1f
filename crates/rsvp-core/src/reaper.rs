//! Background sweep for stale Pending reservations
//!
//! Pending requests that nobody decides on within the retention window
//! are auto-cancelled. The sweep runs on a fixed interval with a short
//! warm-up after process start, and shuts down between ticks only.

use chrono::{DateTime, Utc};
use rsvp_config::ReaperSettings;
use rsvp_store::{AuditKind, AuditRecord, Store, StoreResult};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub struct Reaper {
    store: Arc<dyn Store>,
    settings: ReaperSettings,
}

impl Reaper {
    pub fn new(store: Arc<dyn Store>, settings: ReaperSettings) -> Self {
        Self { store, settings }
    }

    /// Run one sweep with the given clock reading. Every reservation in
    /// the batch is stamped with this same `now`. Returns the number of
    /// reservations cancelled; zero is silent success.
    pub fn sweep(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let age = chrono::Duration::from_std(self.settings.max_pending_age)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let threshold = now - age;

        let swept = self.store.sweep_stale_pending(threshold, now)?;
        if !swept.is_empty() {
            info!(count = swept.len(), "Cancelled stale pending reservations");
            let _ = self
                .store
                .append_audit(AuditRecord::new(AuditKind::StalePendingSwept {
                    count: swept.len(),
                }));
        }

        Ok(swept.len())
    }

    /// Run the sweep loop until the shutdown signal flips.
    ///
    /// A failed sweep is logged and the loop keeps going; the shutdown
    /// signal is only observed between ticks, never mid-batch.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(
            warmup_secs = self.settings.warmup.as_secs(),
            interval_secs = self.settings.interval.as_secs(),
            "Reaper starting"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.settings.warmup) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Reaper stopped before first sweep");
                    return;
                }
            }
        }

        loop {
            if let Err(e) = self.sweep(rsvp_util::now()) {
                error!(error = %e, "Sweep failed, will retry next tick");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reaper shutting down");
                        return;
                    }
                }
            }
        }
    }
}
