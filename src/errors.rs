use thiserror::Error;

/// The central error type for the contract harness.
///
/// The taxonomy keeps contract violations (the service disagrees with its
/// documented contract) apart from transport failures (the service could not
/// be reached) and fixture errors (the harness itself is broken), so a report
/// never mistakes infrastructure trouble for a defect in the service.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractViolation),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Fixture generation error: {0}")]
    Fixture(#[from] FixtureError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An observed response that disagrees with the documented API contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{request}: {check} failed at {path}: expected {expected}, got {actual}")]
pub struct ContractViolation {
    /// Request line that produced the response, e.g. `POST /alumnos`
    pub request: String,
    /// Name of the violated check
    pub check: String,
    /// Location inside the response (`status`, `content-type` or a JSON path)
    pub path: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{request} timed out after {timeout_ms}ms ({attempts} attempts)")]
    Timeout {
        request: String,
        timeout_ms: u64,
        attempts: u32,
    },

    #[error("{request} could not connect: {message} ({attempts} attempts)")]
    Connect {
        request: String,
        message: String,
        attempts: u32,
    },

    #[error("{request} failed: {message} ({attempts} attempts)")]
    Network {
        request: String,
        message: String,
        attempts: u32,
    },

    #[error("{request} returned an unreadable body: {message}")]
    Body { request: String, message: String },
}

impl TransportError {
    /// Whether a bounded retry may succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixtureError {
    #[error("Unique id space exhausted for '{field}' after {attempts} draws")]
    IdSpaceExhausted { field: String, attempts: u32 },

    #[error("Resource '{resource}' has no field '{field}'")]
    UnknownField { resource: String, field: String },

    #[error("No violation requested for resource '{resource}'")]
    NoViolation { resource: String },
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Coarse classification of why a scenario failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Contract,
    Transport,
    Fixture,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Contract => write!(f, "contract"),
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Fixture => write!(f, "fixture"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

impl HarnessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::Contract(_) => FailureKind::Contract,
            HarnessError::Transport(_) => FailureKind::Transport,
            HarnessError::Fixture(_) => FailureKind::Fixture,
            HarnessError::Config(_) | HarnessError::Internal(_) | HarnessError::Other(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Fixture errors are fatal: continuing would only produce false results.
    pub fn aborts_run(&self) -> bool {
        matches!(self, HarnessError::Fixture(_))
    }
}

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_CONTRACT_VIOLATION: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_TRANSPORT_ERROR: u8 = 4;
pub const EXIT_FIXTURE_ERROR: u8 = 5;
pub const EXIT_INTERRUPTED: u8 = 6;

/// Determine the appropriate process exit code for an error that escaped `cli::run`.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(harness_err) = e.downcast_ref::<HarnessError>() {
        return match harness_err {
            HarnessError::Config(_) => EXIT_CONFIG_ERROR,
            HarnessError::Contract(_) => EXIT_CONTRACT_VIOLATION,
            HarnessError::Transport(_) => EXIT_TRANSPORT_ERROR,
            HarnessError::Fixture(_) => EXIT_FIXTURE_ERROR,
            _ => EXIT_CONTRACT_VIOLATION,
        };
    }

    if e.downcast_ref::<FixtureError>().is_some() {
        return EXIT_FIXTURE_ERROR;
    }
    if e.downcast_ref::<TransportError>().is_some() {
        return EXIT_TRANSPORT_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("config") {
        return EXIT_CONFIG_ERROR;
    }

    EXIT_CONTRACT_VIOLATION
}
