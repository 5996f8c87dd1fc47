//! Application services (use cases).
//!
//! These services own the mutable state of the pipeline and coordinate the
//! outbound ports:
//!
//! - [`scheduler`]: recompute admission, prioritization and execution
//! - [`edge`]: edge persistence scoring and retirement
//! - [`calibration`]: prediction calibration against settled outcomes
//! - [`settlement`]: completed games into calibration samples
//! - [`telemetry`]: periodic health snapshots

pub mod cache;
pub mod calibration;
pub mod edge;
pub mod scheduler;
pub mod settlement;
pub mod telemetry;
