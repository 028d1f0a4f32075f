//! Contract suite against the in-process mock service
//!
//! Every scenario runs against `MockSiceiServer`: a conforming service must
//! pass the whole catalog, and each injected fault must be caught by the
//! scenarios that exercise the broken behavior.

mod test_contracts;
mod test_faults;
mod test_suite;
mod test_transport;

pub use helpers::*;
