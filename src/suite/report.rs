//! Run report: per-scenario outcomes rendered as coloured text or JSON.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use uuid::Uuid;

use crate::client::ExchangeRecord;
use crate::errors::{
    FailureKind, EXIT_CONTRACT_VIOLATION, EXIT_FIXTURE_ERROR, EXIT_INTERRUPTED, EXIT_SUCCESS,
    EXIT_TRANSPORT_ERROR,
};

/// Transcript entries kept for a failed scenario
pub const TRANSCRIPT_TAIL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub status: OutcomeStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<ExchangeRecord>,
}

impl ScenarioOutcome {
    pub fn passed(name: &str, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status: OutcomeStatus::Passed,
            duration_ms,
            failure: None,
            skip_reason: None,
            transcript: Vec::new(),
        }
    }

    pub fn failed(
        name: &str,
        duration_ms: u64,
        kind: FailureKind,
        message: String,
        transcript: Vec<ExchangeRecord>,
    ) -> Self {
        let skip = transcript.len().saturating_sub(TRANSCRIPT_TAIL);
        Self {
            name: name.to_string(),
            status: OutcomeStatus::Failed,
            duration_ms,
            failure: Some(Failure { kind, message }),
            skip_reason: None,
            transcript: transcript.into_iter().skip(skip).collect(),
        }
    }

    pub fn skipped(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            status: OutcomeStatus::Skipped,
            duration_ms: 0,
            failure: None,
            skip_reason: Some(reason.to_string()),
            transcript: Vec::new(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub seed: u64,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// A fixture error stopped the run
    pub aborted: bool,
    /// Shutdown was requested while the run was in progress
    pub interrupted: bool,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    fn any_failure(&self, kinds: &[FailureKind]) -> bool {
        self.outcomes
            .iter()
            .filter_map(ScenarioOutcome::failure_kind)
            .any(|k| kinds.contains(&k))
    }

    /// Process exit code.
    ///
    /// Precedence: fixture error (5), contract or internal failure (1),
    /// interruption (6), transport-only failures (4), success (0).
    pub fn exit_code(&self) -> u8 {
        if self.aborted || self.any_failure(&[FailureKind::Fixture]) {
            EXIT_FIXTURE_ERROR
        } else if self.any_failure(&[FailureKind::Contract, FailureKind::Internal]) {
            EXIT_CONTRACT_VIOLATION
        } else if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.any_failure(&[FailureKind::Transport]) {
            EXIT_TRANSPORT_ERROR
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report. Colour is controlled globally through
    /// `colored::control`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} (seed {}) against {}\n",
            "SICEI contract run".bold(),
            self.run_id,
            self.seed,
            self.base_url
        ));
        out.push_str(&format!(
            "started {}\n\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Passed => {
                    out.push_str(&format!(
                        "  {} {} ({}ms)\n",
                        "PASS".green().bold(),
                        outcome.name,
                        outcome.duration_ms
                    ));
                }
                OutcomeStatus::Skipped => {
                    out.push_str(&format!(
                        "  {} {} ({})\n",
                        "SKIP".yellow().bold(),
                        outcome.name,
                        outcome.skip_reason.as_deref().unwrap_or("skipped")
                    ));
                }
                OutcomeStatus::Failed => {
                    let kind = outcome
                        .failure_kind()
                        .map(|k| k.to_string())
                        .unwrap_or_default();
                    out.push_str(&format!(
                        "  {} {} ({}ms) [{}]\n",
                        "FAIL".red().bold(),
                        outcome.name,
                        outcome.duration_ms,
                        kind
                    ));
                    if let Some(failure) = &outcome.failure {
                        out.push_str(&format!("       {}\n", failure.message));
                    }
                    for exchange in &outcome.transcript {
                        out.push_str(&format!("       {} {}\n", ">".dimmed(), exchange));
                    }
                }
            }
        }

        let passed = self.count(OutcomeStatus::Passed);
        let failed = self.count(OutcomeStatus::Failed);
        let skipped = self.count(OutcomeStatus::Skipped);
        let summary = format!(
            "{} passed, {} failed, {} skipped in {:.2}s",
            passed,
            failed,
            skipped,
            self.duration_ms as f64 / 1000.0
        );
        out.push('\n');
        if failed > 0 {
            out.push_str(&summary.red().to_string());
        } else {
            out.push_str(&summary.green().to_string());
        }
        out.push('\n');
        if self.aborted {
            out.push_str(&format!(
                "{}\n",
                "run aborted: fixture generation failed".red().bold()
            ));
        }
        if self.interrupted {
            out.push_str(&format!("{}\n", "run interrupted".yellow().bold()));
        }
        if failed > 0 {
            out.push_str(&format!("rerun with --seed {} to replay the same fixtures\n", self.seed));
        }
        out
    }
}
