//! Domain types for recompute scheduling, edge tracking, calibration and
//! settlement.
//!
//! Nothing in here does I/O. Values cross component boundaries by copy.

pub mod calibration;
pub mod edge;
pub mod id;
pub mod prediction;
pub mod recompute;
pub mod settlement;
pub mod telemetry;
