//! Crate for the `brokerstat` project
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod collector;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logger;
pub mod sinks;
pub mod stats;
pub mod worker;

/// Capacity of the shared inbound delivery channel. Sized to the broker
/// prefetch window so producers hit backpressure at the same point the
/// broker does.
pub const DELIVERY_BUFFER: usize = 128;

/// Capacity of the worker-to-collector hand-off channel. A full channel
/// stalls that worker's tick emission until the collector drains; nothing
/// is dropped on this path.
pub const COLLECTOR_BUFFER: usize = 64;

/// Per-sink broadcast buffer. A sink that falls further behind than this
/// loses updates instead of stalling the collector.
pub const SINK_BUFFER: usize = 2;
