//! Named end-to-end flows built from probe operations.
//!
//! A flow runs its steps in order on the calling thread, records one
//! `ProbeResult` per step, and hands the collected `FlowResult` to the
//! metrics sink under its own output file name.

mod access;
mod identity_link;
mod resolver;
mod user_info;

pub use access::DrsAccessFlow;
pub use identity_link::IdentityLinkFlow;
pub use resolver::ResolverFlow;
pub use user_info::UserInfoFlow;

use crate::config::{ConfigSnapshot, SecretString};
use crate::identity::{TokenError, TokenProvider};
use crate::probe::{FlowResult, ProbeResult};
use crate::probe_engine::ClientOptions;
use crate::probe_ops::ProbeSession;
use crate::storage::MetricsSink;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{step} skipped: no {missing} was obtained")]
    Incomplete {
        step: &'static str,
        missing: &'static str,
    },
    #[error("caller token unavailable: {0}")]
    Credential(#[from] TokenError),
    #[error("HTTP engine setup failed: {0}")]
    Client(#[from] curl::Error),
}

/// Everything a flow needs, passed in explicitly.
#[derive(Clone)]
pub struct FlowContext {
    pub config: Arc<ConfigSnapshot>,
    pub tokens: Arc<dyn TokenProvider>,
    pub sink: Arc<MetricsSink>,
    pub client: ClientOptions,
}

impl FlowContext {
    pub fn session(&self) -> Result<ProbeSession<'_>, FlowError> {
        Ok(ProbeSession::new(&self.config, self.client.clone())?)
    }

    pub fn caller_token(&self) -> Result<SecretString, FlowError> {
        Ok(self.tokens.caller_token()?)
    }
}

pub trait FlowReporter: Send + Sync {
    fn name(&self) -> &'static str;

    /// File the flow's rows are appended to.
    fn output_name(&self) -> &'static str;

    fn context(&self) -> &FlowContext;

    /// Executes the steps, recording each one into `result` as it completes.
    fn run(&self, result: &mut FlowResult) -> Result<(), FlowError>;

    /// Runs the flow and returns whatever steps completed. Never fails.
    fn measure(&self) -> FlowResult {
        let mut result = FlowResult::new();
        match self.run(&mut result) {
            Ok(()) => debug!(flow = self.name(), steps = result.len(), "flow complete"),
            Err(err @ FlowError::Incomplete { .. }) => {
                warn!(flow = self.name(), steps = result.len(), "{err}");
            }
            Err(err) => {
                error!(flow = self.name(), steps = result.len(), error = ?err, "flow aborted: {err}");
            }
        }
        result
    }

    fn report(&self) {
        let result = self.measure();
        if let Err(err) = self.context().sink.record(self.output_name(), &result) {
            error!(flow = self.name(), "failed to record flow metrics: {err}");
        }
    }
}

pub(crate) fn record_step(flow: &'static str, result: &mut FlowResult, step: &str, probe: ProbeResult) {
    debug!(
        flow,
        step,
        status = ?probe.status_code,
        duration_ms = probe.duration.as_millis() as u64,
        "step measured"
    );
    result.record(step, probe);
}

/// The four monitored flows, sharing one context.
pub fn standard_flows(context: &FlowContext) -> Vec<Arc<dyn FlowReporter>> {
    vec![
        Arc::new(DrsAccessFlow::new(context.clone())),
        Arc::new(ResolverFlow::new(context.clone())),
        Arc::new(IdentityLinkFlow::new(context.clone())),
        Arc::new(UserInfoFlow::new(context.clone())),
    ]
}
