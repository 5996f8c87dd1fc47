//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`valuation`] - `ScriptedValuationEngine`, a [`ValuationEngine`](crate::port::ValuationEngine)
//!   driven by a script of successes, failures, delays and panics.
//! - [`results`] - `StaticResultSource`, an in-memory game result source.
//! - [`domain`] - Builders for edges, predictions and game results.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod domain;
pub mod results;
pub mod valuation;
