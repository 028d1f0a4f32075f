//! Assertion Engine
//!
//! Declarative checks over an [`ApiResponse`]. A failed check produces a
//! [`ContractViolation`] naming the request, the check, the location in the
//! response and both values. Checks are chained through [`Expect`] and the
//! chain stops at the first violation.

use serde_json::{Map, Value};

use crate::client::{ApiResponse, ContentType};
use crate::errors::ContractViolation;
use crate::observability::telemetry::safe_log;

/// Tolerance for numeric field comparison
const FLOAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    StatusEquals(u16),
    /// Any 2xx status
    StatusSuccess,
    ContentTypeIs(ContentType),
    FieldEquals { path: String, expected: Value },
    /// String field containing a substring
    FieldContains { path: String, needle: String },
    /// Present, non-null, and non-empty if a string, array or object
    FieldNonEmpty { path: String },
    /// String field of exactly `len` characters
    FieldLength { path: String, len: usize },
    /// String field holding a URL whose host is `domain` or a subdomain of it
    FieldHostMatches { path: String, domain: String },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::StatusEquals(_) => "status",
            Check::StatusSuccess => "status-success",
            Check::ContentTypeIs(_) => "content-type",
            Check::FieldEquals { .. } => "field-equals",
            Check::FieldContains { .. } => "field-contains",
            Check::FieldNonEmpty { .. } => "field-non-empty",
            Check::FieldLength { .. } => "field-length",
            Check::FieldHostMatches { .. } => "field-host",
        }
    }

    fn location(&self) -> &str {
        match self {
            Check::StatusEquals(_) | Check::StatusSuccess => "status",
            Check::ContentTypeIs(_) => "content-type",
            Check::FieldEquals { path, .. }
            | Check::FieldContains { path, .. }
            | Check::FieldNonEmpty { path }
            | Check::FieldLength { path, .. }
            | Check::FieldHostMatches { path, .. } => path,
        }
    }

    pub fn evaluate(&self, response: &ApiResponse) -> Result<(), ContractViolation> {
        let (passed, expected, actual) = match self {
            Check::StatusEquals(code) => (
                response.status == *code,
                code.to_string(),
                response.status.to_string(),
            ),
            Check::StatusSuccess => (
                response.is_success(),
                "2xx".to_string(),
                response.status.to_string(),
            ),
            Check::ContentTypeIs(expected) => {
                let actual = response.content_type.as_ref();
                (
                    actual == Some(expected),
                    expected.as_mime().to_string(),
                    actual.map_or_else(|| "<missing>".to_string(), |ct| ct.as_mime().to_string()),
                )
            }
            Check::FieldEquals { path, expected } => {
                let actual = response.json_path(path);
                (
                    actual.is_some_and(|a| values_match(a, expected)),
                    describe(Some(expected)),
                    describe(actual),
                )
            }
            Check::FieldContains { path, needle } => {
                let actual = response.json_path(path);
                (
                    actual
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.contains(needle.as_str())),
                    format!("string containing '{}'", needle),
                    describe(actual),
                )
            }
            Check::FieldNonEmpty { path } => {
                let actual = response.json_path(path);
                (
                    actual.is_some_and(is_non_empty),
                    "non-empty value".to_string(),
                    describe(actual),
                )
            }
            Check::FieldLength { path, len } => {
                let actual = response.json_path(path);
                let actual_len = actual.and_then(Value::as_str).map(|s| s.chars().count());
                (
                    actual_len == Some(*len),
                    format!("string of length {}", len),
                    match actual_len {
                        Some(n) => format!("string of length {}", n),
                        None => describe(actual),
                    },
                )
            }
            Check::FieldHostMatches { path, domain } => {
                let actual = response.json_path(path);
                let host = actual.and_then(Value::as_str).and_then(url_host);
                (
                    host.as_deref().is_some_and(|h| host_matches(h, domain)),
                    format!("URL on host {}", domain),
                    match host {
                        Some(h) => format!("URL on host {}", h),
                        None => describe(actual),
                    },
                )
            }
        };

        if passed {
            Ok(())
        } else {
            Err(ContractViolation {
                request: response.request_line.clone(),
                check: self.name().to_string(),
                path: self.location().to_string(),
                expected,
                actual,
            })
        }
    }
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(e)) if actual.is_number() && expected.is_number() => {
            (a - e).abs() < FLOAT_EPSILON
        }
        _ => actual == expected,
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(v) => safe_log(&v.to_string()),
    }
}

fn url_host(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// `host` equals `domain` or ends with `.domain`.
///
/// `s3.amazonaws.com` also matches the regional endpoints
/// (`bucket.s3.us-east-1.amazonaws.com`, `bucket.s3-us-west-2.amazonaws.com`).
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.to_lowercase();
    let domain = domain.trim_start_matches('.').to_lowercase();
    if host == domain || host.ends_with(&format!(".{}", domain)) {
        return true;
    }
    domain == "s3.amazonaws.com"
        && host.ends_with(".amazonaws.com")
        && host
            .split('.')
            .any(|label| label == "s3" || label.starts_with("s3-"))
}

/// Fail-fast check chain over one response.
///
/// ```ignore
/// let id = Expect::that(&resp).status(201)?.json()?.extract_i64("id")?;
/// ```
pub struct Expect<'a> {
    response: &'a ApiResponse,
}

impl<'a> Expect<'a> {
    pub fn that(response: &'a ApiResponse) -> Self {
        Self { response }
    }

    pub fn check(self, check: Check) -> Result<Self, ContractViolation> {
        check.evaluate(self.response)?;
        Ok(self)
    }

    pub fn status(self, code: u16) -> Result<Self, ContractViolation> {
        self.check(Check::StatusEquals(code))
    }

    pub fn success(self) -> Result<Self, ContractViolation> {
        self.check(Check::StatusSuccess)
    }

    pub fn json(self) -> Result<Self, ContractViolation> {
        self.check(Check::ContentTypeIs(ContentType::Json))
    }

    pub fn field_eq(self, path: &str, expected: &Value) -> Result<Self, ContractViolation> {
        self.check(Check::FieldEquals {
            path: path.to_string(),
            expected: expected.clone(),
        })
    }

    pub fn field_contains(self, path: &str, needle: &str) -> Result<Self, ContractViolation> {
        self.check(Check::FieldContains {
            path: path.to_string(),
            needle: needle.to_string(),
        })
    }

    pub fn field_non_empty(self, path: &str) -> Result<Self, ContractViolation> {
        self.check(Check::FieldNonEmpty {
            path: path.to_string(),
        })
    }

    pub fn field_len(self, path: &str, len: usize) -> Result<Self, ContractViolation> {
        self.check(Check::FieldLength {
            path: path.to_string(),
            len,
        })
    }

    pub fn field_host(self, path: &str, domain: &str) -> Result<Self, ContractViolation> {
        self.check(Check::FieldHostMatches {
            path: path.to_string(),
            domain: domain.to_string(),
        })
    }

    /// Integer at `path`; a missing or non-integer value is a violation.
    pub fn extract_i64(self, path: &str) -> Result<i64, ContractViolation> {
        let value = self.response.json_path(path);
        value.and_then(Value::as_i64).ok_or_else(|| ContractViolation {
            request: self.response.request_line.clone(),
            check: "extract".to_string(),
            path: path.to_string(),
            expected: "integer".to_string(),
            actual: describe(value),
        })
    }

    /// String at `path`; a missing or non-string value is a violation.
    pub fn extract_str(self, path: &str) -> Result<String, ContractViolation> {
        let value = self.response.json_path(path);
        value
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ContractViolation {
                request: self.response.request_line.clone(),
                check: "extract".to_string(),
                path: path.to_string(),
                expected: "string".to_string(),
                actual: describe(value),
            })
    }

    /// Object at `path` (`$` for the whole body).
    pub fn extract_object(self, path: &str) -> Result<Map<String, Value>, ContractViolation> {
        let value = self.response.json_path(path);
        value
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| ContractViolation {
                request: self.response.request_line.clone(),
                check: "extract".to_string(),
                path: path.to_string(),
                expected: "object".to_string(),
                actual: describe(value),
            })
    }
}
