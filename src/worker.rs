use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::delivery::Delivery;
use crate::error::PipelineError;
use crate::stats::aggregator::AggregationTable;

/// One consumer slot. Workers compete for deliveries on a shared channel,
/// fold each into a private [`AggregationTable`], and on every aggregate
/// tick hand the whole table to the collector and start over empty.
#[allow(clippy::module_name_repetitions)]
pub struct Worker {
    id: usize,
    deliveries: async_channel::Receiver<Delivery>,
    collector: Sender<AggregationTable>,
    interval: Duration,
    cancel_token: CancellationToken,
    table: AggregationTable,
}

impl Worker {
    #[must_use]
    pub fn new(
        id: usize,
        deliveries: async_channel::Receiver<Delivery>,
        collector: Sender<AggregationTable>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            deliveries,
            collector,
            interval,
            cancel_token,
            table: AggregationTable::new(),
        }
    }

    /// Consumes until cancelled or the delivery source closes. An
    /// acknowledgment failure is returned as a fatal error; the driver tears
    /// the whole pipeline down in response.
    pub async fn run(mut self) -> Result<(), PipelineError> {
        debug!("WORKER {} | started", self.id);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("WORKER {} | shutdown signal received", self.id);
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.emit().await?;
                }
                delivery = self.deliveries.recv() => {
                    match delivery {
                        Ok(delivery) => self.process(delivery).await?,
                        Err(_) => {
                            debug!("WORKER {} | delivery source closed, emitting remainder", self.id);
                            self.emit().await?;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn process(&mut self, mut delivery: Delivery) -> Result<(), PipelineError> {
        let size = delivery.body.len() as u64;
        self.table
            .record(&delivery.exchange, &delivery.routing_key, size);
        delivery.ack().await?;
        Ok(())
    }

    /// Hands the accumulated table to the collector as one message and
    /// resets. A full collector channel stalls this worker's emission, which
    /// only delays its next reset; nothing is lost.
    async fn emit(&mut self) -> Result<(), PipelineError> {
        let table = std::mem::take(&mut self.table);
        self.collector
            .send(table)
            .await
            .map_err(|_| PipelineError::CollectorClosed)
    }
}
