//! Observability module
//!
//! Tracing setup and log hygiene for harness runs.

pub mod telemetry;
