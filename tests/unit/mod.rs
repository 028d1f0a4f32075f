//! Unit tests for sicei-contract modules
//!
//! These tests cover the public API of individual components; the only
//! network I/O is against the in-process mock service.

mod test_cli;
mod test_config;
mod test_fixtures;
mod test_mock_service;
