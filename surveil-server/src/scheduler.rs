//! Fixed-interval detection scheduler.
//!
//! Runs a detection cycle every `detection.interval_ms`. A cadence change
//! from a config reload takes effect on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use surveil_core::types::unix_now;

use crate::engine::Engine;

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

fn ticker(interval_ms: u64) -> Interval {
    let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Scheduler {
    /// Start the detection loop on the current runtime.
    pub fn spawn(engine: Arc<Engine>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut period = engine.interval_ms();
            let mut tick = ticker(period);
            info!(interval_ms = period, "detection scheduler started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let report = engine.run_detection_cycle(unix_now());
                        debug!(
                            tracks = report.tracks_predicted,
                            pairs = report.pairs_checked,
                            active = report.active.len(),
                            "detection cycle"
                        );

                        let current = engine.interval_ms();
                        if current != period {
                            info!(from = period, to = current, "detection interval changed");
                            period = current;
                            tick = ticker(period);
                            // First tick of a fresh interval fires immediately
                            tick.tick().await;
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("detection scheduler stopped");
        });
        Scheduler { shutdown_tx, handle }
    }

    /// Stop the loop and wait for an in-progress cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "detection scheduler task failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
