//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  scheduler, edges,      │
//!                    │  calibration, settlement│
//!                    └─────────────────────────┘
//!                                │
//!     ┌──────────────────────────┼──────────────────────────┐
//!     ▼                          ▼                          ▼
//! ┌───────────┐          ┌──────────────┐           ┌───────────┐
//! │ Valuation │          │ Game results │           │ Telemetry │
//! │  engine   │          │    source    │           │   sink    │
//! └───────────┘          └──────────────┘           └───────────┘
//! ```

pub mod outbound;

pub use outbound::results::GameResultSource;
pub use outbound::telemetry::{LogSink, TelemetrySink};
pub use outbound::valuation::{Valuation, ValuationEngine};
