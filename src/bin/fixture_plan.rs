use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixture_pool::plan::FixturePlan;
use fixture_pool::{init_tracing, EngineConfig, FixtureHarness, FixturePool};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "fixture_plan",
    about = "Run declarative fixture plans through the fixture pool"
)]
struct Cli {
    /// Engine configuration JSON (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute every test in a plan and print the report as JSON
    Run {
        #[arg(long)]
        plan: PathBuf,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a plan without running it
    Check {
        #[arg(long)]
        plan: PathBuf,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(EngineConfig::load_from_file)
        .unwrap_or_default();
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    match cli.command {
        Commands::Run { plan, output } => run_plan(config, &plan, output),
        Commands::Check { plan } => run_check(&plan),
    }
}

fn run_plan(config: EngineConfig, path: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    let plan = FixturePlan::load(path).with_context(|| format!("loading {}", path.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let report = runtime.block_on(async {
        let pool = FixturePool::with_config(config);
        plan.install(&pool)?;
        let harness = FixtureHarness::new(pool);
        Ok::<_, anyhow::Error>(plan.run(&harness).await)
    })?;

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(if report.passed {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn run_check(path: &Path) -> Result<ExitCode> {
    let plan = FixturePlan::load(path).with_context(|| format!("loading {}", path.display()))?;
    let summary = CheckSummary {
        plan: path.display().to_string(),
        fixtures: plan.fixtures.len(),
        tests: plan.tests.len(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct CheckSummary {
    plan: String,
    fixtures: usize,
    tests: usize,
}
