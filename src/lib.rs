//! SICEI Contract Harness
//!
//! Black-box verification of a running SICEI deployment (the students /
//! teachers REST service) against its documented HTTP contract.
//!
//! - **Fixtures**: seeded, reproducible valid and invalid payloads per resource
//! - **Client**: JSON and multipart requests with bounded transport retries
//! - **Contracts**: resource CRUD, notification, session lifecycle, profile upload
//! - **Suite**: named scenarios run concurrently, reported as text or JSON
//!
//! # Quick Start
//!
//! ```ignore
//! use sicei_contract::{config::HarnessConfig, suite};
//!
//! let config = HarnessConfig::for_base_url("http://localhost:5000").validate()?;
//! let runner = suite::SuiteRunner::new(std::sync::Arc::new(config))?;
//! let report = runner.run(suite::catalog()).await;
//! std::process::exit(report.exit_code() as i32);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

pub mod assertions;
pub mod cli;
pub mod client;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod fixtures;
pub mod observability;
pub mod suite;
pub mod testing;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Ask long-running work to wind down. Called from the signal handler.
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
