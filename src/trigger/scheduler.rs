//! Periodic driver for [`TriggerEngine::run`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use super::TriggerEngine;

pub struct TriggerScheduler {
    engine: Arc<TriggerEngine>,
    tick_interval: Duration,
}

impl TriggerScheduler {
    pub fn new(engine: Arc<TriggerEngine>, tick_interval: Duration) -> Self {
        Self {
            engine,
            tick_interval,
        }
    }

    /// Run passes every tick until `shutdown` fires. The first pass runs
    /// after one full interval.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.tick_interval.as_secs(),
            "Starting trigger scheduler"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Trigger scheduler shutdown requested");
                    break;
                }
                _ = sleep(self.tick_interval) => {
                    if let Err(err) = self.engine.run().await {
                        error!(error = %err, "Trigger pass failed; retrying next tick");
                    }
                }
            }
        }

        info!("Trigger scheduler stopped");
    }
}
