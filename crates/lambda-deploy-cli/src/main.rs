//! Lambda-Deploy - CI deployment of a Lambda function fleet
//!
//! The `lambda-deploy` command reads a JSON list of functions and runs three
//! phases against them:
//!
//! 1. configuration (runtime, handler, latest layer versions)
//! 2. code (artifact from `<bucket>/<path>/<zip>`, optionally published)
//! 3. alias (point the alias at the newest listed version; only when publishing)
//!
//! Every option can be given as a flag or through its environment variable.
//! Exit status: 0 on success, 1 on any fatal error, 130 when interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use lambda_deploy_api::LambdaApi;
use lambda_deploy_aws::AwsLambdaApi;
use lambda_deploy_core::telemetry::{init_tracing, LogFormat};
use lambda_deploy_core::{
    load_function_specs, write_report_json, AliasVersionStrategy, DeployError, DeploySettings,
    FunctionSpec, PhaseSequencer, SettingsInput, EXIT_FAILURE,
};
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "lambda-deploy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy configuration, code and aliases to a fleet of Lambda functions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "DEPLOY_LOG_JSON")]
    json: bool,

    /// JSON file listing the functions to deploy
    #[arg(long, env = "LAMBDA_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Bucket holding the build artifacts
    #[arg(long, env = "ARTIFACT_BUCKET")]
    artifact_bucket: Option<String>,

    /// Key prefix of this build's artifacts inside the bucket
    #[arg(long, env = "ARTIFACT_PATH")]
    artifact_path: Option<String>,

    /// Alias to move to the new versions (required when publishing)
    #[arg(long, env = "ALIAS_NAME")]
    alias_name: Option<String>,

    /// Publish new versions and update aliases; only "true" enables it
    #[arg(long, env = "PUBLISH")]
    publish: Option<String>,

    /// Seconds between readiness checks
    #[arg(long, env = "WAIT_DELAY_SECONDS")]
    wait_delay_seconds: Option<u64>,

    /// Readiness checks before giving up on a function
    #[arg(long, env = "WAIT_MAX_ATTEMPTS")]
    wait_max_attempts: Option<u32>,

    /// Version the alias points at: last-listed or highest
    #[arg(long, env = "ALIAS_VERSION_STRATEGY")]
    alias_version_strategy: Option<AliasVersionStrategy>,

    /// Functions updated concurrently within a phase
    #[arg(long, env = "DEPLOY_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Write a JSON deployment report to this path
    #[arg(long, env = "DEPLOY_REPORT_FILE")]
    report: Option<PathBuf>,
}

impl Cli {
    fn settings_input(&self) -> SettingsInput {
        SettingsInput {
            alias_name: self.alias_name.clone(),
            artifact_bucket: self.artifact_bucket.clone(),
            config_file: self.config_file.clone(),
            artifact_path: self.artifact_path.clone(),
            publish: self.publish.clone(),
            wait_delay_secs: self.wait_delay_seconds,
            wait_max_attempts: self.wait_max_attempts,
            alias_strategy: self.alias_version_strategy,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    let result = tokio::select! {
        result = run(&cli) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(DeployError::Interrupted.into()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if matches!(err.downcast_ref::<DeployError>(), Some(DeployError::Interrupted)) {
                warn!("Deployment interrupted by user");
            } else {
                error!("✗ Deployment failed: {:#}", err);
            }
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Validate settings, load the function list, then deploy against AWS.
async fn run(cli: &Cli) -> Result<u8> {
    log_startup(cli);
    let settings = Arc::new(DeploySettings::resolve(cli.settings_input())?);
    let specs = load_function_specs(&settings.config_file)?;
    let api = Arc::new(AwsLambdaApi::from_env().await);
    deploy(cli, settings, specs, api).await
}

/// Banner lines, logged from the raw inputs so they appear even when
/// validation fails right after.
fn log_startup(cli: &Cli) {
    const UNSET: &str = "<unset>";
    info!("Starting Lambda deployment");
    info!(
        "Config: {} | Bucket: {}/{}",
        cli.config_file
            .as_deref()
            .map_or_else(|| UNSET.to_string(), |p| p.display().to_string()),
        cli.artifact_bucket.as_deref().unwrap_or(UNSET),
        cli.artifact_path.as_deref().unwrap_or(UNSET)
    );
}

async fn deploy(
    cli: &Cli,
    settings: Arc<DeploySettings>,
    specs: Vec<FunctionSpec>,
    api: Arc<dyn LambdaApi>,
) -> Result<u8> {
    let outcome = PhaseSequencer::new(api, settings).run(specs).await;

    if let Some(path) = &cli.report {
        match write_report_json(path, &outcome.report) {
            Ok(()) => info!(path = %path.display(), "Wrote deployment report"),
            Err(e) => warn!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "Failed to write deployment report"
            ),
        }
    }

    Ok(outcome.exit_code())
}

/// Exit status for an error that ended the run before or outside a phase.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<DeployError>()
        .map_or(EXIT_FAILURE, DeployError::exit_code)
}
