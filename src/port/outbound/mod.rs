//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the external collaborators: the valuation engine,
//! the sports-data service that reports final results, and telemetry sinks.

pub mod results;
pub mod telemetry;
pub mod valuation;
