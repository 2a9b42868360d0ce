use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Receiver;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::SinkError;
use crate::stats::snapshot::Snapshot;

/// Persistence consumer: remembers the most recent snapshot and appends it
/// to the output file on its own cadence, one JSON array per line.
///
/// The persist cadence is deliberately slower than the snapshot cadence, so
/// this sink samples the stream instead of writing every broadcast.
#[allow(clippy::module_name_repetitions)]
pub struct FileSink {
    rx: Receiver<Snapshot>,
    path: PathBuf,
    interval: Duration,
    cancel_token: CancellationToken,
    last: Option<Snapshot>,
}

impl FileSink {
    #[must_use]
    pub fn new(
        rx: Receiver<Snapshot>,
        path: PathBuf,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            rx,
            path,
            interval,
            cancel_token,
            last: None,
        }
    }

    /// Runs until cancelled or a write fails. A write failure ends this sink
    /// only; aggregation and the other sinks are unaffected.
    pub async fn run(mut self) {
        debug!("FILE_SINK | started, appending to {}", self.path.display());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("FILE_SINK | shutdown signal received");
                    return;
                }
                snapshot = self.rx.recv() => {
                    let Some(snapshot) = snapshot else {
                        debug!("FILE_SINK | broadcast channel closed");
                        return;
                    };
                    self.last = Some(snapshot);
                }
                _ = ticker.tick() => {
                    let Some(snapshot) = self.last.clone() else {
                        continue;
                    };
                    if let Err(e) = self.append(&snapshot).await {
                        error!("FILE_SINK | append to {} failed: {e}", self.path.display());
                        return;
                    }
                }
            }
        }
    }

    async fn append(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(snapshot.as_ref())?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
