//! Integration tests against a live SICEI deployment
//!
//! Run with: cargo test --features integration
//!
//! Configure with environment variables:
//!   SICEI_BASE_URL       - base URL of the deployment (required, tests skip without it)
//!   SICEI_STORAGE_DOMAIN - host of profile picture URLs (default: s3.amazonaws.com)
//!   SICEI_TIMEOUT_SECS   - per-request timeout (default: 30)

mod live_tests;
