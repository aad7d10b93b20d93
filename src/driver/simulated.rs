use std::time::Duration;

use tokio::sync::mpsc;

use super::{cancel_pair, CancelSignal, DriverHandle, DriverRequest, DriverTick, TransferDriver};
use crate::{config::Config, error::Result, models::Direction};

#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    tick_interval: Duration,
    chunk_divisor: u64,
    min_chunk_size: u64,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SimulatedDriver {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            chunk_divisor: config.chunk_divisor,
            min_chunk_size: config.min_chunk_size,
        }
    }

    pub fn chunk_size(&self, total: u64) -> u64 {
        (total / self.chunk_divisor.max(1))
            .max(self.min_chunk_size)
            .max(1)
    }
}

impl TransferDriver for SimulatedDriver {
    fn begin(&self, request: DriverRequest) -> Result<DriverHandle> {
        let (tx, rx) = mpsc::channel(32);
        let (cancel, signal) = cancel_pair();

        log::debug!(
            "simulating {} of {} bytes ({:?} relay)",
            request.direction,
            request.descriptor.size,
            request.relay_mode
        );

        let driver = self.clone();
        tokio::spawn(async move { driver.run(request, tx, signal).await });

        Ok(DriverHandle::new(rx, cancel))
    }
}

impl SimulatedDriver {
    async fn run(
        self,
        request: DriverRequest,
        tx: mpsc::Sender<DriverTick>,
        mut signal: CancelSignal,
    ) {
        let total = request.descriptor.size;
        let chunk = self.chunk_size(total);

        if request.direction == Direction::Receive {
            let names = vec![request.descriptor.name.clone()];
            if tx.send(DriverTick::FileNames(names)).await.is_err() {
                return;
            }
        }

        let mut transferred = 0u64;
        while transferred < total {
            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    log::trace!("simulated transfer cancelled at {transferred}/{total}");
                    return;
                }
                _ = tokio::time::sleep(self.tick_interval) => {}
            }

            transferred = transferred.saturating_add(chunk).min(total);
            if tx.send(DriverTick::Progress(transferred)).await.is_err() {
                return;
            }
        }

        if signal.is_cancelled() {
            return;
        }
        let _ = tx.send(DriverTick::Completed).await;
    }
}
