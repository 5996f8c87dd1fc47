//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! business logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`supervisor`] - Cancellable periodic background tasks

pub mod bootstrap;
pub mod config;
pub mod supervisor;

pub use bootstrap::Services;
pub use supervisor::Supervisor;
