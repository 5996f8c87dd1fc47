//! Edgeguard - recompute scheduling and edge quality tracking for sports prop
//! valuations.
//!
//! The crate sits between the feeds that report line moves, lineups, weather,
//! injuries and live events, and an external valuation engine:
//!
//! - [`application::scheduler`] - admits, debounces, prioritizes and runs
//!   recompute jobs under a circuit breaker
//! - [`application::edge`] - scores how long detected edges persist and
//!   retires them by type-specific rules
//! - [`application::calibration`] - tracks predicted probabilities against
//!   settled outcomes per prop type
//! - [`application::settlement`] - turns completed games into calibration
//!   samples and flags confident misses
//! - [`application::telemetry`] - periodic health snapshots
//!
//! # Architecture
//!
//! - [`domain`] - Plain data types and identifiers
//! - [`port`] - Traits for the valuation engine, result source and telemetry sinks
//! - [`application`] - Stateful services
//! - [`adapter`] - HTTP implementations of the ports
//! - [`infrastructure`] - Configuration, supervision and composition
//! - [`cli`] - The `edgeguard` binary's commands
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use edgeguard::adapter::outbound::http::{HttpResultSource, HttpValuationEngine};
//! use edgeguard::infrastructure::{config::Config, Services};
//!
//! # async fn example() -> edgeguard::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let timeout = config.endpoints.request_timeout();
//! let engine = HttpValuationEngine::new(config.endpoints.valuation()?, timeout);
//! let results = HttpResultSource::new(config.endpoints.results()?, timeout);
//!
//! let mut services = Services::build(&config, Arc::new(engine), Arc::new(results));
//! services.start();
//! # services.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
