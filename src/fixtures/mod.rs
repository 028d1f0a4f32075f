//! Fixture generation
//!
//! Resource descriptors describe each collection's fields and validity rules;
//! the generator produces valid and deliberately invalid payloads from them.

pub mod descriptor;
pub mod generator;

pub use descriptor::{
    FieldKind, FieldSpec, Fixture, ResourceDescriptor, ResourceKind, Validity, STUDENT, TEACHER,
};
pub use generator::{scenario_seed, FixtureGenerator, IdRegistry};
