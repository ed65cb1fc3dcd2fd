use crate::config::ConfigSnapshot;
use crate::identity::DEFAULT_TOKEN_COMMAND;
use std::path::PathBuf;
use std::time::Duration;

/// Where the caller's identity token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Command(String),
    Env(String),
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::Command(DEFAULT_TOKEN_COMMAND.to_string())
    }
}

/// Validated process settings. `config` is already resolved for the chosen
/// deployment, with any object-URI override applied.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub config: ConfigSnapshot,
    pub output_dir: PathBuf,
    pub interval: Duration,
    pub token_source: TokenSource,
    pub request_timeout: Option<Duration>,
    pub run_for: Option<Duration>,
}
