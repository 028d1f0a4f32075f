//! Resource descriptors: the field schema and validity rules of each
//! collection exposed by the service.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

use crate::errors::FixtureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Student,
    Teacher,
}

impl ResourceKind {
    /// Collection path segment
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Student => "alumnos",
            ResourceKind::Teacher => "profesores",
        }
    }

    /// Scenario-name prefix
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Student => "students",
            ResourceKind::Teacher => "teachers",
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        match self {
            ResourceKind::Student => &STUDENT,
            ResourceKind::Teacher => &TEACHER,
        }
    }

    pub fn all() -> [ResourceKind; 2] {
        [ResourceKind::Student, ResourceKind::Teacher]
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "students" | "student" | "alumnos" => Ok(ResourceKind::Student),
            "teachers" | "teacher" | "profesores" => Ok(ResourceKind::Teacher),
            other => Err(format!("unknown resource '{}'", other)),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Semantic type of a field together with its validity predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Letters, spaces, `-` and `'`; non-empty. `sample` is used by valid fixtures.
    PersonName { sample: &'static str },
    /// One ASCII letter followed by digits, e.g. `A123456`
    Matricula,
    /// Grade average in `[0, 10]`
    Average,
    /// Weekly class hours in `[0, 50]`
    Hours,
    /// Strictly positive integer
    PositiveInteger,
    /// Non-empty string
    Secret,
}

fn matricula_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z][0-9]+$").ok())
        .as_ref()
}

impl FieldKind {
    /// Inclusive range of the numeric kinds
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            FieldKind::Average => Some((0.0, 10.0)),
            FieldKind::Hours => Some((0.0, 50.0)),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::PersonName { .. } => value.as_str().is_some_and(|s| {
                !s.trim().is_empty()
                    && s.chars()
                        .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '\'')
            }),
            FieldKind::Matricula => value
                .as_str()
                .is_some_and(|s| matricula_pattern().is_some_and(|re| re.is_match(s))),
            FieldKind::Average | FieldKind::Hours => {
                let (min, max) = self.bounds().unwrap_or((0.0, 0.0));
                value
                    .as_f64()
                    .is_some_and(|n| n.is_finite() && n >= min && n <= max)
            }
            FieldKind::PositiveInteger => value.as_i64().is_some_and(|n| n > 0),
            FieldKind::Secret => value.as_str().is_some_and(|s| !s.is_empty()),
        }
    }

    /// The value invalid fixtures carry for this kind: `null` for required
    /// strings, a negative number for numerics and for `matricula`.
    pub fn violating_value(&self) -> Value {
        match self {
            FieldKind::PersonName { .. } | FieldKind::Secret => Value::Null,
            FieldKind::Matricula => json!(-1.223),
            FieldKind::Average | FieldKind::Hours => json!(-1.26),
            FieldKind::PositiveInteger => json!(-3688),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Whether GET returns the stored value (passwords are never echoed)
    pub echoed: bool,
}

/// Field schema of one resource collection
#[derive(Debug)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub fields: &'static [FieldSpec],
}

pub static STUDENT: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Student,
    fields: &[
        FieldSpec {
            name: "nombres",
            kind: FieldKind::PersonName { sample: "Eduardo" },
            echoed: true,
        },
        FieldSpec {
            name: "apellidos",
            kind: FieldKind::PersonName { sample: "Rodriguez" },
            echoed: true,
        },
        FieldSpec {
            name: "matricula",
            kind: FieldKind::Matricula,
            echoed: true,
        },
        FieldSpec {
            name: "promedio",
            kind: FieldKind::Average,
            echoed: true,
        },
        FieldSpec {
            name: "password",
            kind: FieldKind::Secret,
            echoed: false,
        },
    ],
};

pub static TEACHER: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Teacher,
    fields: &[
        FieldSpec {
            name: "nombres",
            kind: FieldKind::PersonName { sample: "Profesor" },
            echoed: true,
        },
        FieldSpec {
            name: "apellidos",
            kind: FieldKind::PersonName { sample: "Rodriguez" },
            echoed: true,
        },
        FieldSpec {
            name: "numeroEmpleado",
            kind: FieldKind::PositiveInteger,
            echoed: true,
        },
        FieldSpec {
            name: "horasClase",
            kind: FieldKind::Hours,
            echoed: true,
        },
    ],
};

impl ResourceDescriptor {
    pub fn path(&self) -> &'static str {
        self.kind.path()
    }

    pub fn field(&self, name: &str) -> Result<&FieldSpec, FixtureError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FixtureError::UnknownField {
                resource: self.path().to_string(),
                field: name.to_string(),
            })
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Names of the fields whose value in `fixture` fails its predicate.
    /// A missing field counts as a violation.
    pub fn violations(&self, fixture: &Fixture) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|spec| {
                !fixture
                    .get(spec.name)
                    .is_some_and(|value| spec.kind.accepts(value))
            })
            .map(|spec| spec.name)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
}

/// Generated request-body data for one resource
#[derive(Debug, Clone, Serialize)]
pub struct Fixture {
    pub resource: ResourceKind,
    pub validity: Validity,
    /// Fields deliberately set to violating values; empty for valid fixtures
    pub violated: Vec<String>,
    fields: Map<String, Value>,
}

impl Fixture {
    pub(crate) fn new(resource: ResourceKind, fields: Map<String, Value>) -> Self {
        Self {
            resource,
            validity: Validity::Valid,
            violated: Vec::new(),
            fields,
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.resource.descriptor()
    }

    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }

    /// JSON request body
    pub fn body(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Overwrite one field. Writing a violating value marks the fixture invalid.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), FixtureError> {
        let spec = self.descriptor().field(field)?;
        let accepted = spec.kind.accepts(&value);
        self.fields.insert(field.to_string(), value);
        self.violated.retain(|f| f != field);
        if !accepted {
            self.violated.push(field.to_string());
        }
        self.validity = if self.violated.is_empty() {
            Validity::Valid
        } else {
            Validity::Invalid
        };
        Ok(())
    }

    pub fn password(&self) -> Option<&str> {
        self.fields.get("password").and_then(Value::as_str)
    }

    /// Field/value pairs a fetch of the stored resource must reproduce.
    pub fn echoed_fields(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.descriptor()
            .fields
            .iter()
            .filter(|spec| spec.echoed)
            .filter_map(|spec| self.fields.get(spec.name).map(|v| (spec.name, v)))
    }
}
