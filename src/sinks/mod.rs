//! Snapshot consumers. Each sink owns a bounded receiver on the collector's
//! broadcast and runs as an independent task; sinks are unaware of each
//! other, and a failing sink never affects aggregation.

pub mod display;
pub mod file;
