//! Seeded fixture generation.
//!
//! Every scenario owns a [`FixtureGenerator`] derived from the run seed and
//! its own name, so rerunning with the same `--seed` replays the exact
//! payloads of a failing scenario regardless of scheduling order. Identifying
//! numbers are claimed in a run-wide [`IdRegistry`] to keep concurrent
//! scenarios from colliding on `matricula` / `numeroEmpleado`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::descriptor::{FieldKind, Fixture, ResourceKind, Validity};
use crate::errors::FixtureError;

/// Upper bound (exclusive) of generated identifiers
pub const ID_SPACE: u32 = 1_000_000;
/// Upper bound (exclusive) of generated class hours
pub const HOURS_SPACE: u32 = 50;
/// Length of a session identifier issued by the service
pub const SESSION_ID_LEN: usize = 128;
pub const PASSWORD_LEN: usize = 10;
/// Draws attempted before a unique id is declared unobtainable
pub const MAX_UNIQUE_DRAWS: u32 = 64;

/// Run-wide record of identifying numbers already handed out, per field.
#[derive(Debug, Default)]
pub struct IdRegistry {
    issued: Mutex<HashMap<String, HashSet<u32>>>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `value` for `field`; false when it was already issued.
    pub fn claim(&self, field: &str, value: u32) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.entry(field.to_string()).or_default().insert(value)
    }

    pub fn issued_count(&self, field: &str) -> usize {
        let issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.get(field).map_or(0, HashSet::len)
    }
}

/// FNV-1a over the scenario name, folded into the run seed.
pub fn scenario_seed(run_seed: u64, scenario: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET ^ run_seed;
    for byte in scenario.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A fresh run seed when none was configured.
pub fn random_run_seed() -> u64 {
    rand::rng().random()
}

fn check_violations(resource: ResourceKind, violated: &[&str]) -> Result<(), FixtureError> {
    if violated.is_empty() {
        return Err(FixtureError::NoViolation {
            resource: resource.path().to_string(),
        });
    }
    let descriptor = resource.descriptor();
    for name in violated {
        descriptor.field(name)?;
    }
    Ok(())
}

pub struct FixtureGenerator {
    rng: StdRng,
    seed: u64,
    registry: Arc<IdRegistry>,
}

impl FixtureGenerator {
    pub fn new(seed: u64, registry: Arc<IdRegistry>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            registry,
        }
    }

    pub fn for_scenario(run_seed: u64, scenario: &str, registry: Arc<IdRegistry>) -> Self {
        Self::new(scenario_seed(run_seed, scenario), registry)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Identifier in `0..1_000_000`
    pub fn random_id(&mut self) -> u32 {
        self.rng.random_range(0..ID_SPACE)
    }

    /// Hour count in `0..50`
    pub fn random_hours(&mut self) -> u32 {
        self.rng.random_range(0..HOURS_SPACE)
    }

    /// Average in `[0, 10]`, one decimal
    pub fn random_average(&mut self) -> f64 {
        (self.rng.random::<f64>() * 100.0).round() / 10.0
    }

    /// Lowercase ASCII letters
    pub fn random_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(self.rng.random_range(b'a'..=b'z')))
            .collect()
    }

    /// Identifier in `1..1_000_000` not yet issued for `field` in this run.
    pub fn unique_id(&mut self, field: &str) -> Result<u32, FixtureError> {
        for _ in 0..MAX_UNIQUE_DRAWS {
            let candidate = self.rng.random_range(1..ID_SPACE);
            if self.registry.claim(field, candidate) {
                return Ok(candidate);
            }
        }
        Err(FixtureError::IdSpaceExhausted {
            field: field.to_string(),
            attempts: MAX_UNIQUE_DRAWS,
        })
    }

    /// Resource id outside the generated id space, for unknown-id probes.
    pub fn absent_id(&mut self) -> i64 {
        i64::from(self.rng.random_range(ID_SPACE..2 * ID_SPACE))
    }

    /// Random string shaped like a session identifier
    pub fn forged_session(&mut self) -> String {
        self.random_string(SESSION_ID_LEN)
    }

    pub fn password(&mut self) -> String {
        self.random_string(PASSWORD_LEN)
    }

    /// A fixture satisfying every field predicate of `resource`.
    pub fn valid(&mut self, resource: ResourceKind) -> Result<Fixture, FixtureError> {
        let mut fields = Map::new();
        for spec in resource.descriptor().fields {
            let value = match spec.kind {
                FieldKind::PersonName { sample } => json!(sample),
                FieldKind::Matricula => json!(format!("A{}", self.unique_id(spec.name)?)),
                FieldKind::Average => json!(self.random_average()),
                FieldKind::Hours => json!(self.random_hours()),
                FieldKind::PositiveInteger => json!(self.unique_id(spec.name)?),
                FieldKind::Secret => json!(self.password()),
            };
            fields.insert(spec.name.to_string(), value);
        }
        Ok(Fixture::new(resource, fields))
    }

    /// A valid fixture with exactly the named fields overwritten by violating values.
    pub fn invalid(
        &mut self,
        resource: ResourceKind,
        violated: &[&str],
    ) -> Result<Fixture, FixtureError> {
        // Resolve names before drawing anything so a typo never consumes ids
        check_violations(resource, violated)?;
        let valid = self.valid(resource)?;
        self.corrupt(&valid, violated)
    }

    /// Copy of `fixture` with the named fields overwritten by violating values.
    pub fn corrupt(&mut self, fixture: &Fixture, violated: &[&str]) -> Result<Fixture, FixtureError> {
        check_violations(fixture.resource, violated)?;
        let descriptor = fixture.descriptor();
        let mut corrupted = fixture.clone();
        for name in violated {
            let spec = descriptor.field(name)?;
            let value = spec.kind.violating_value();
            corrupted.set(spec.name, value)?;
        }
        debug_assert_eq!(corrupted.validity, Validity::Invalid);
        Ok(corrupted)
    }

    /// Replacement values for the echoed, non-identifying fields of `fixture`,
    /// used to prove an update was applied.
    pub fn revise(&mut self, fixture: &Fixture) -> Result<Fixture, FixtureError> {
        let mut revised = fixture.clone();
        for spec in fixture.descriptor().fields {
            let value = match spec.kind {
                FieldKind::PersonName { sample } if spec.name == "nombres" => {
                    Value::from(format!("Nuevo {}", sample))
                }
                FieldKind::Matricula => json!(format!("A{}", self.unique_id(spec.name)?)),
                FieldKind::Average => json!(self.random_average()),
                FieldKind::Hours => json!(self.random_hours()),
                _ => continue,
            };
            revised.set(spec.name, value)?;
        }
        Ok(revised)
    }
}
