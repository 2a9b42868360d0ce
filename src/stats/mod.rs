pub mod aggregator;
pub mod snapshot;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exchange label of the grand-total record, always at index 0 of a snapshot.
pub const TOTAL_EXCHANGE: &str = "_total_";
/// Routing-key label of the grand-total record.
pub const TOTAL_ROUTING_KEY: &str = "#";

/// Running counters for one (exchange, routing key) pair within a window.
///
/// Counters only grow while the window is open; a worker resets by replacing
/// its whole table, never by mutating a stat back down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoutingStat {
    pub count: u64,
    pub body_size: u64,
    pub max_size: u64,
}

impl RoutingStat {
    /// Folds another observation (or another window's accumulated stat) into
    /// this one. Sum for count and bytes, max for the largest message seen.
    pub fn add(&mut self, count: u64, body_size: u64, max_size: u64) {
        self.count += count;
        self.body_size += body_size;
        if max_size > self.max_size {
            self.max_size = max_size;
        }
    }

    /// Derives the immutable per-tag record for this stat given the time
    /// elapsed since aggregation started.
    ///
    /// Degenerate inputs produce zero-valued rates rather than errors: a zero
    /// elapsed duration (first tick racing the clock) and a zero count both
    /// yield 0 for the derived fields.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn derive(&self, exchange: &str, routing_key: &str, elapsed: Duration) -> Stats {
        let secs = elapsed.as_secs_f64();
        let avg_msg_per_sec = if secs > 0.0 {
            self.count as f64 / secs
        } else {
            0.0
        };
        let avg_body_size = if self.count > 0 {
            self.body_size / self.count
        } else {
            0
        };
        let avg_body_size_per_sec = if secs > 0.0 {
            (self.body_size as f64 / secs) as u64
        } else {
            0
        };

        Stats {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            count: self.count,
            total_size: self.body_size,
            max_size: self.max_size,
            avg_msg_per_sec,
            avg_body_size,
            avg_body_size_per_sec,
        }
    }
}

/// Fully-derived, immutable view of one tag at one point in time. Created
/// fresh on every snapshot tick and handed to sinks by shared reference,
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub exchange: String,
    pub routing_key: String,
    pub count: u64,
    pub total_size: u64,
    pub max_size: u64,
    pub avg_msg_per_sec: f64,
    pub avg_body_size: u64,
    pub avg_body_size_per_sec: u64,
}
