//! Error types shared across the pipeline

use crate::delivery::AckError;

/// Fatal pipeline conditions. Any of these aborts aggregation as a whole;
/// the driver cancels every task and exits with a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Acknowledging a delivery failed, which means the broker channel can
    /// no longer be trusted.
    #[error(transparent)]
    Ack(#[from] AckError),
    /// The collector went away while workers were still emitting.
    #[error("collector channel closed")]
    CollectorClosed,
}

/// Failures local to one sink's loop. These end that sink only; aggregation
/// keeps running.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
