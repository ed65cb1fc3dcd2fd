use crate::common::time::utc_run_stamp;
use crate::config::{self, ConfigError};
use crate::data_model::settings::{MonitorSettings, TokenSource};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "drspulse")]
#[command(about = "Synthetic latency monitor for DRS access flows", long_about = None)]
pub struct CliArgs {
    /// Project to monitor: anvil|bdc|crdc|kf
    #[arg(long, value_name = "NAME", alias = "project-name")]
    project: String,

    /// Deployment tier: dev|alpha|perf|staging|prod
    #[arg(long, value_name = "NAME", alias = "terra-deployment-tier")]
    tier: String,

    /// Directory for CSV output and the log file
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Seconds between flow runs
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    interval_secs: u64,

    /// Override the deployment's test object (drs://...)
    #[arg(long, value_name = "URI")]
    object_uri: Option<String>,

    /// Command printing the caller's identity token
    #[arg(long, value_name = "CMD", conflicts_with = "token_env")]
    token_command: Option<String>,

    /// Environment variable holding the caller's identity token
    #[arg(long, value_name = "VAR")]
    token_env: Option<String>,

    /// Total per-request timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Stop after this many seconds instead of running until killed
    #[arg(long)]
    run_for_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("interval must be greater than zero seconds (got {value})")]
    InvalidInterval { value: u64 },
    #[error("request timeout must be greater than zero seconds (got {value})")]
    InvalidRequestTimeout { value: u64 },
    #[error("run duration must be greater than zero seconds (got {value})")]
    InvalidRunFor { value: u64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn load_from_cli() -> Result<MonitorSettings, SettingsError> {
    let args = CliArgs::parse();
    from_args(args)
}

pub fn from_args(args: CliArgs) -> Result<MonitorSettings, SettingsError> {
    if args.interval_secs == 0 {
        return Err(SettingsError::InvalidInterval {
            value: args.interval_secs,
        });
    }
    let request_timeout = positive_secs(args.request_timeout_secs)
        .map_err(|value| SettingsError::InvalidRequestTimeout { value })?;
    let run_for =
        positive_secs(args.run_for_secs).map_err(|value| SettingsError::InvalidRunFor { value })?;

    let mut config = config::resolve_names(&args.project, &args.tier)?;
    if let Some(uri) = args.object_uri.as_deref() {
        config = config.with_object_uri(uri)?;
    }

    let token_source = match (args.token_command, args.token_env) {
        (_, Some(var)) => TokenSource::Env(var),
        (Some(command), None) => TokenSource::Command(command),
        (None, None) => TokenSource::default(),
    };

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(format!("./monitoring_output_{}", utc_run_stamp())));

    Ok(MonitorSettings {
        config,
        output_dir,
        interval: Duration::from_secs(args.interval_secs),
        token_source,
        request_timeout,
        run_for,
    })
}

fn positive_secs(value: Option<u64>) -> Result<Option<Duration>, u64> {
    match value {
        Some(0) => Err(0),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
        None => Ok(None),
    }
}
