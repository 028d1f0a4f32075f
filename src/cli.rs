//! SICEI contract harness - command line front end.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, EXIT_SUCCESS};
use crate::fixtures::generator::random_run_seed;
use crate::fixtures::{FixtureGenerator, IdRegistry, ResourceKind};
use crate::observability::telemetry::{init_tracing, init_tracing_verbose};
use crate::suite::{self, SuiteRunner};

#[derive(Parser)]
#[command(name = "sicei-contract")]
#[command(about = "Verify a running SICEI deployment against its REST contract")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (defaults to ./sicei-contract.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Base URL of the deployment under test
    #[arg(short = 'u', long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Host that profile picture URLs must point at
    #[arg(long, value_name = "HOST", global = true)]
    storage_domain: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Seed for fixture generation (replays a previous run)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log progress at info level
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Output format of the run report
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON output for CI pipelines
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the contract scenarios (default)
    Run {
        /// Only run scenarios whose name contains PATTERN (repeatable)
        #[arg(long, value_name = "PATTERN")]
        only: Vec<String>,

        /// Scenarios executed at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        output_format: OutputFormat,

        /// Image uploaded by the profile picture scenarios
        #[arg(long, value_name = "FILE")]
        upload_image: Option<PathBuf>,
    },

    /// List the scenario catalog
    List,

    /// Print a generated fixture as JSON
    Fixture {
        /// students or teachers
        resource: ResourceKind,

        /// Field to fill with a violating value (repeatable)
        #[arg(long, value_name = "FIELD")]
        invalid: Vec<String>,
    },
}

/// Parse arguments, execute the command and return the process exit code.
pub async fn run() -> Result<u8> {
    let cli = Cli::parse();

    if cli.verbose {
        init_tracing_verbose();
    } else {
        init_tracing();
    }

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let command = cli.command.unwrap_or(Commands::Run {
        only: Vec::new(),
        concurrency: None,
        output_format: OutputFormat::Text,
        upload_image: None,
    });

    match command {
        Commands::List => {
            for scenario in suite::catalog() {
                println!("{:<32} {}", scenario.name.bold(), scenario.description);
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Fixture { resource, invalid } => {
            let seed = cli.seed.unwrap_or_else(random_run_seed);
            let mut gen = FixtureGenerator::new(seed, Arc::new(IdRegistry::new()));
            let names: Vec<&str> = invalid.iter().map(String::as_str).collect();
            let fixture = if names.is_empty() {
                gen.valid(resource)
            } else {
                gen.invalid(resource, &names)
            }
            .map_err(HarnessError::from)?;
            println!("{}", serde_json::to_string_pretty(&fixture.body())?);
            Ok(EXIT_SUCCESS)
        }
        Commands::Run {
            only,
            concurrency,
            output_format,
            upload_image,
        } => {
            let mut config = HarnessConfig::load(cli.config.as_deref())?;
            if let Some(base_url) = cli.base_url {
                config.target.base_url = Some(base_url);
            }
            if let Some(domain) = cli.storage_domain {
                config.target.storage_domain = domain;
            }
            if let Some(timeout) = cli.timeout_secs {
                config.http.timeout_secs = timeout;
            }
            if let Some(seed) = cli.seed {
                config.run.seed = Some(seed);
            }
            if let Some(concurrency) = concurrency {
                config.run.concurrency = concurrency;
            }
            if let Some(path) = upload_image {
                config.run.upload_image = Some(path);
            }
            let config = Arc::new(config.validate()?);

            let scenarios = suite::select(&only);
            if scenarios.is_empty() {
                return Err(HarnessError::Config(format!(
                    "no scenario matches {:?}; see `sicei-contract list`",
                    only
                ))
                .into());
            }

            let runner = SuiteRunner::new(config)?;
            let report = runner.run(scenarios).await;
            match output_format {
                OutputFormat::Text => print!("{}", report.render_text()),
                OutputFormat::Json => println!("{}", report.render_json()?),
            }
            Ok(report.exit_code())
        }
    }
}
