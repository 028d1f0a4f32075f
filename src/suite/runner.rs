//! Suite runner
//!
//! Runs scenarios concurrently up to the configured limit. Requests inside a
//! scenario stay sequential. A fixture error aborts the run: scenarios not
//! yet started are reported as skipped, as they are after a shutdown request.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::catalog::{Scenario, ScenarioContext};
use super::report::{ScenarioOutcome, SuiteReport};
use crate::client::ContractClient;
use crate::config::HarnessConfig;
use crate::errors::Result;
use crate::fixtures::generator::random_run_seed;
use crate::fixtures::{FixtureGenerator, IdRegistry};
use crate::observability::telemetry::{safe_log, track_scenario};

pub struct SuiteRunner {
    config: Arc<HarnessConfig>,
    client: ContractClient,
    registry: Arc<IdRegistry>,
    seed: u64,
    upload_image: Arc<(String, Vec<u8>)>,
}

impl SuiteRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: Arc<HarnessConfig>) -> Result<Self> {
        let client = ContractClient::new(&config)?;
        Self::with_client(config, client)
    }

    /// Build a runner around an existing client (custom retry policy, tests).
    pub fn with_client(config: Arc<HarnessConfig>, client: ContractClient) -> Result<Self> {
        let seed = config.run.seed.unwrap_or_else(random_run_seed);
        let upload_image = Arc::new(config.upload_image()?);
        Ok(Self {
            config,
            client,
            registry: Arc::new(IdRegistry::new()),
            seed,
            upload_image,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub async fn run(&self, scenarios: Vec<Scenario>) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let abort = AtomicBool::new(false);

        info!(
            run_id = %run_id,
            seed = self.seed,
            scenarios = scenarios.len(),
            concurrency = self.config.run.concurrency,
            "Starting contract run"
        );

        let mut outcomes: Vec<(usize, ScenarioOutcome)> = stream::iter(scenarios.iter().enumerate())
            .map(|(idx, scenario)| {
                let abort = &abort;
                async move { (idx, self.run_one(scenario, abort).await) }
            })
            .buffer_unordered(self.config.run.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(idx, _)| *idx);

        let report = SuiteReport {
            run_id,
            seed: self.seed,
            base_url: self.config.base_url().to_string(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            aborted: abort.load(Ordering::SeqCst),
            interrupted: crate::is_shutdown_requested(),
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        };
        info!(
            run_id = %run_id,
            exit_code = report.exit_code(),
            duration_ms = report.duration_ms,
            "Contract run finished"
        );
        report
    }

    async fn run_one(&self, scenario: &Scenario, abort: &AtomicBool) -> ScenarioOutcome {
        if abort.load(Ordering::SeqCst) {
            return ScenarioOutcome::skipped(&scenario.name, "run aborted");
        }
        if crate::is_shutdown_requested() {
            return ScenarioOutcome::skipped(&scenario.name, "shutdown requested");
        }

        let mut ctx = ScenarioContext {
            client: self.client.fork(),
            gen: FixtureGenerator::for_scenario(self.seed, &scenario.name, self.registry.clone()),
            config: self.config.clone(),
            upload_image: self.upload_image.clone(),
        };
        let start = Instant::now();
        let result = track_scenario(&scenario.name, scenario.execute(&mut ctx)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => ScenarioOutcome::passed(&scenario.name, duration_ms),
            Err(e) => {
                if e.aborts_run() {
                    error!(
                        scenario = scenario.name.as_str(),
                        "Fixture error, aborting run: {}",
                        safe_log(&e.to_string())
                    );
                    abort.store(true, Ordering::SeqCst);
                } else {
                    warn!(
                        scenario = scenario.name.as_str(),
                        kind = %e.kind(),
                        "Scenario failed"
                    );
                }
                ScenarioOutcome::failed(
                    &scenario.name,
                    duration_ms,
                    e.kind(),
                    safe_log(&e.to_string()),
                    ctx.client.transcript(),
                )
            }
        }
    }
}
