use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stats::aggregator::AggregationTable;
use crate::stats::snapshot::{self, Snapshot};

/// Single owner of the global aggregation state.
///
/// All worker tables funnel through one channel into this loop, which is the
/// only code that ever mutates the global table; no locking exists anywhere
/// in the pipeline. On its own tick it derives the ordered snapshot list and
/// broadcasts it to every registered sink.
pub struct Collector {
    rx: Receiver<AggregationTable>,
    sinks: Vec<Sender<Snapshot>>,
    interval: Duration,
    cancel_token: CancellationToken,
    total: AggregationTable,
    started_at: Instant,
}

impl Collector {
    #[must_use]
    pub fn new(
        rx: Receiver<AggregationTable>,
        sinks: Vec<Sender<Snapshot>>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            rx,
            sinks,
            interval,
            cancel_token,
            total: AggregationTable::new(),
            started_at: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        debug!("COLLECTOR | started with {} sink(s)", self.sinks.len());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("COLLECTOR | shutdown signal received");
                    return;
                }
                Some(table) = self.rx.recv() => {
                    self.total.merge(&table);
                }
                _ = ticker.tick() => {
                    self.publish();
                }
            }
        }
    }

    /// Derives the snapshot list for this tick and offers it to every sink.
    /// Sends are non-blocking: a saturated sink drops this update rather
    /// than stalling aggregation.
    fn publish(&self) {
        let snapshot: Snapshot = Snapshot::new(snapshot::build(&self.total, self.started_at.elapsed()));
        for (index, sink) in self.sinks.iter().enumerate() {
            match sink.try_send(Snapshot::clone(&snapshot)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("COLLECTOR | sink {index} saturated, dropping snapshot");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("COLLECTOR | sink {index} closed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stats::{TOTAL_EXCHANGE, TOTAL_ROUTING_KEY};
    use tokio::sync::mpsc;

    fn spawn_collector(
        sink_count: usize,
        sink_buffer: usize,
    ) -> (
        Sender<AggregationTable>,
        Vec<Receiver<Snapshot>>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (table_tx, table_rx) = mpsc::channel(16);
        let mut sink_txs = Vec::with_capacity(sink_count);
        let mut sink_rxs = Vec::with_capacity(sink_count);
        for _ in 0..sink_count {
            let (tx, rx) = mpsc::channel(sink_buffer);
            sink_txs.push(tx);
            sink_rxs.push(rx);
        }
        let cancel_token = CancellationToken::new();
        let collector = Collector::new(
            table_rx,
            sink_txs,
            Duration::from_secs(1),
            cancel_token.clone(),
        );
        let handle = tokio::spawn(collector.run());
        (table_tx, sink_rxs, cancel_token, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn merges_worker_tables_into_global_state() {
        let (table_tx, mut sink_rxs, cancel_token, handle) = spawn_collector(1, 4);

        // two workers land in the same merge window
        let mut a = AggregationTable::new();
        a.stat_mut("ex1", "rk1").add(3, 300, 150);
        let mut b = AggregationTable::new();
        b.stat_mut("ex1", "rk1").add(2, 100, 80);
        table_tx.send(a).await.unwrap();
        table_tx.send(b).await.unwrap();

        let snapshot = sink_rxs[0].recv().await.unwrap();
        let record = snapshot
            .iter()
            .find(|s| s.exchange == "ex1" && s.routing_key == "rk1")
            .unwrap();
        assert_eq!(record.count, 5);
        assert_eq!(record.total_size, 400);
        assert_eq!(record.max_size, 150);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn global_state_persists_across_ticks() {
        let (table_tx, mut sink_rxs, cancel_token, handle) = spawn_collector(1, 4);

        let mut table = AggregationTable::new();
        table.stat_mut("orders", "created").add(1, 10, 10);
        table_tx.send(table).await.unwrap();

        let first = sink_rxs[0].recv().await.unwrap();
        // an empty worker emission must not erase anything
        table_tx.send(AggregationTable::new()).await.unwrap();
        let second = sink_rxs[0].recv().await.unwrap();

        assert_eq!(first[0].count, 1);
        assert_eq!(second[0].count, 1);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_with_no_events_emits_zero_total() {
        let (_table_tx, mut sink_rxs, cancel_token, handle) = spawn_collector(1, 4);

        let snapshot = sink_rxs[0].recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].exchange, TOTAL_EXCHANGE);
        assert_eq!(snapshot[0].routing_key, TOTAL_ROUTING_KEY);
        assert_eq!(snapshot[0].count, 0);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn every_sink_receives_the_same_list() {
        let (table_tx, mut sink_rxs, cancel_token, handle) = spawn_collector(2, 4);

        let mut table = AggregationTable::new();
        table.stat_mut("orders", "created").add(2, 20, 15);
        table_tx.send(table).await.unwrap();

        let first = sink_rxs[0].recv().await.unwrap();
        let second = sink_rxs[1].recv().await.unwrap();
        assert_eq!(*first, *second);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_sink_does_not_stall_the_others() {
        // sink 0 never drains a 1-slot buffer; sink 1 keeps reading
        let (table_tx, mut sink_rxs, cancel_token, handle) = spawn_collector(2, 1);

        let mut table = AggregationTable::new();
        table.stat_mut("orders", "created").add(1, 10, 10);
        table_tx.send(table).await.unwrap();

        for _ in 0..5 {
            let snapshot = sink_rxs[1].recv().await.unwrap();
            assert_eq!(snapshot[0].count, 1);
        }

        // the stuck sink holds exactly the first update; later ones were dropped
        let stuck = sink_rxs[0].try_recv().unwrap();
        assert_eq!(stuck[0].count, 1);
        assert!(sink_rxs[0].try_recv().is_err());

        cancel_token.cancel();
        handle.await.unwrap();
    }
}
