//! Configuration Management
//!
//! Loads the harness configuration from a TOML file and the environment.
//! Configuration includes:
//! - Target settings (base URL of the deployment, expected storage domain)
//! - HTTP settings (per-request and connect timeouts)
//! - Retry settings for transport failures
//! - Run settings (seed, concurrency, forged-session probes, upload image)
//!
//! The loaded [`HarnessConfig`] is validated once and then shared read-only
//! (`Arc<HarnessConfig>`) with every component for the rest of the run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::HarnessError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sicei-contract.toml";

pub const ENV_BASE_URL: &str = "SICEI_BASE_URL";
pub const ENV_STORAGE_DOMAIN: &str = "SICEI_STORAGE_DOMAIN";
pub const ENV_TIMEOUT_SECS: &str = "SICEI_TIMEOUT_SECS";
pub const ENV_SEED: &str = "SICEI_SEED";
pub const ENV_CONCURRENCY: &str = "SICEI_CONCURRENCY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub run: RunConfig,
}

/// Where the service under test lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Base URL of the deployment. Deliberately has no default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Host (or host suffix) every issued storage URL must point at
    #[serde(default = "default_storage_domain")]
    pub storage_domain: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            storage_domain: default_storage_domain(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Retry behaviour for transport failures. Contract violations are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run seed; a random one is drawn (and reported) when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Maximum number of scenarios in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Forged session identifiers tried per brute-force scenario
    #[serde(default = "default_forged_probes")]
    pub forged_session_probes: usize,
    /// Image uploaded by the upload scenarios; the embedded test JPEG when unset
    #[serde(default)]
    pub upload_image: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            concurrency: default_concurrency(),
            forged_session_probes: default_forged_probes(),
            upload_image: None,
        }
    }
}

fn default_storage_domain() -> String {
    "s3.amazonaws.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    2000
}
fn default_concurrency() -> usize {
    4
}
fn default_forged_probes() -> usize {
    5
}

impl HarnessConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when it exists, then
    /// apply environment overrides. The result is not yet validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config: HarnessConfig = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(content) => toml::from_str(&content).context("Failed to parse config")?,
                Err(_) => Self::default(),
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            self.target.base_url = Some(base_url);
        }
        if let Ok(domain) = std::env::var(ENV_STORAGE_DOMAIN) {
            self.target.storage_domain = domain;
        }
        if let Ok(timeout) = std::env::var(ENV_TIMEOUT_SECS) {
            self.http.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &timeout)?;
        }
        if let Ok(seed) = std::env::var(ENV_SEED) {
            self.run.seed = Some(parse_env(ENV_SEED, &seed)?);
        }
        if let Ok(concurrency) = std::env::var(ENV_CONCURRENCY) {
            self.run.concurrency = parse_env(ENV_CONCURRENCY, &concurrency)?;
        }
        Ok(())
    }

    /// Configuration for a known base URL with every other setting defaulted.
    pub fn for_base_url(base_url: &str) -> Self {
        let mut config = Self::default();
        config.target.base_url = Some(base_url.to_string());
        config
    }

    /// Normalise and check the configuration, failing with
    /// [`HarnessError::Config`] when it cannot drive a run.
    pub fn validate(mut self) -> std::result::Result<Self, HarnessError> {
        let raw = self
            .target
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                HarnessError::Config(format!(
                    "no base URL configured; pass --base-url, set {} or add [target] base_url",
                    ENV_BASE_URL
                ))
            })?;
        self.target.base_url = Some(normalize_base_url(raw)?);

        if self.target.storage_domain.trim().is_empty() {
            return Err(HarnessError::Config(
                "storage_domain must not be empty".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(HarnessError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.run.concurrency == 0 {
            return Err(HarnessError::Config(
                "concurrency must be greater than zero".to_string(),
            ));
        }
        if self.run.forged_session_probes == 0 {
            return Err(HarnessError::Config(
                "forged_session_probes must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Validated base URL. Empty before [`HarnessConfig::validate`] ran.
    pub fn base_url(&self) -> &str {
        self.target.base_url.as_deref().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_secs)
    }

    /// Bytes of the image used by the upload scenarios.
    pub fn upload_image(&self) -> std::result::Result<(String, Vec<u8>), HarnessError> {
        match &self.run.upload_image {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    HarnessError::Config(format!(
                        "cannot read upload image {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "upload.jpg".to_string());
                Ok((name, bytes))
            }
            None => Ok((
                crate::contracts::upload::EMBEDDED_IMAGE_NAME.to_string(),
                crate::contracts::upload::EMBEDDED_IMAGE.to_vec(),
            )),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        HarnessError::Config(format!("{} has an invalid value: '{}'", name, raw)).into()
    })
}

/// Accepts bare hosts (`ec2-1-2-3-4.compute-1.amazonaws.com`) as `http://` URLs
/// and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> std::result::Result<String, HarnessError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| HarnessError::Config(format!("invalid base URL '{}': {}", raw, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(HarnessError::Config(format!(
            "base URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(HarnessError::Config(format!(
            "base URL '{}' has no host",
            raw
        )));
    }
    Ok(candidate.trim_end_matches('/').to_string())
}
