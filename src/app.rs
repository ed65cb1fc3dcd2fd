//! Process-level wiring: settings in, running scheduler out.

use crate::config::ConfigSnapshot;
use crate::data_model::settings::{MonitorSettings, TokenSource};
use crate::flows::{FlowContext, FlowReporter, standard_flows};
use crate::identity::{CommandTokenProvider, StaticTokenProvider, TokenError, TokenProvider};
use crate::probe_engine::ClientOptions;
use crate::runtime::{DEFAULT_POLL_INTERVAL, Scheduler, SchedulerError};
use crate::storage::{MetricsSink, StorageError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("identity token source: {0}")]
    Token(#[from] TokenError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub struct Monitor {
    sink: Arc<MetricsSink>,
    flows: Vec<Arc<dyn FlowReporter>>,
    scheduler: Scheduler,
}

impl Monitor {
    /// Builds the token source and registers every flow. Nothing runs until
    /// [`Monitor::start`].
    pub fn new(settings: &MonitorSettings) -> Result<Self, MonitorError> {
        let tokens = token_provider(&settings.token_source)?;
        Self::from_parts(settings.config.clone(), tokens, settings)
    }

    pub fn from_parts(
        snapshot: ConfigSnapshot,
        tokens: Arc<dyn TokenProvider>,
        settings: &MonitorSettings,
    ) -> Result<Self, MonitorError> {
        let sink = Arc::new(MetricsSink::new(&settings.output_dir));
        sink.ensure_output_dir()?;

        let config = Arc::new(snapshot);
        let context = FlowContext {
            config: Arc::clone(&config),
            tokens,
            sink: Arc::clone(&sink),
            client: ClientOptions {
                timeout: settings.request_timeout,
            },
        };

        let scheduler = Scheduler::new(poll_interval_for(settings.interval));
        let flows = standard_flows(&context);
        for flow in &flows {
            let job = Arc::clone(flow);
            scheduler.every(flow.name(), settings.interval, move || job.report())?;
        }

        info!(
            project = %config.project,
            tier = %config.tier,
            object = config.default_object_uri.as_str(),
            output_dir = %sink.output_dir().display(),
            interval_secs = settings.interval.as_secs_f64(),
            flows = flows.len(),
            "monitor configured"
        );

        Ok(Self {
            sink,
            flows,
            scheduler,
        })
    }

    pub fn output_dir(&self) -> &Path {
        self.sink.output_dir()
    }

    pub fn flow_names(&self) -> Vec<&'static str> {
        self.flows.iter().map(|flow| flow.name()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn start(&mut self) -> Result<(), MonitorError> {
        Ok(self.scheduler.start()?)
    }

    /// Stops scheduling new runs. Runs already in flight finish on their own.
    pub fn stop(&mut self) -> Result<(), MonitorError> {
        Ok(self.scheduler.stop()?)
    }
}

fn token_provider(source: &TokenSource) -> Result<Arc<dyn TokenProvider>, TokenError> {
    Ok(match source {
        TokenSource::Command(command) => Arc::new(CommandTokenProvider::new(command)?),
        TokenSource::Env(var) => Arc::new(StaticTokenProvider::from_env(var)?),
    })
}

/// The poll interval must stay strictly below the flow interval.
fn poll_interval_for(interval: Duration) -> Duration {
    DEFAULT_POLL_INTERVAL.min(interval / 2)
}
