//! Internal telemetry for the transcript gateway.
//!
//! Structured logging setup, process-local metrics, and component health
//! used by the readiness probes.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
