//! Testing support
//!
//! An in-process mock of the service under test, used by the crate's own
//! test suites and available to anyone wiring the harness into CI.

pub mod mock_service;

pub use mock_service::{Fault, MockServiceConfig, MockSiceiServer, MockSiceiServerBuilder};
