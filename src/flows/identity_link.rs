use super::{FlowContext, FlowError, FlowReporter, record_step};
use crate::probe::FlowResult;

pub const STEP_LINK_URL: &str = "bond_get_link_url";
pub const STEP_LINK_STATUS: &str = "bond_get_link_status";

/// Authorization-link discovery and link status. The steps are independent.
pub struct IdentityLinkFlow {
    context: FlowContext,
}

impl IdentityLinkFlow {
    pub fn new(context: FlowContext) -> Self {
        Self { context }
    }
}

impl FlowReporter for IdentityLinkFlow {
    fn name(&self) -> &'static str {
        "identity_link"
    }

    fn output_name(&self) -> &'static str {
        "bond_external_identity_response_times.csv"
    }

    fn context(&self) -> &FlowContext {
        &self.context
    }

    fn run(&self, result: &mut FlowResult) -> Result<(), FlowError> {
        let caller = self.context.caller_token()?;
        let mut session = self.context.session()?;

        let (_link, probe) = session.identity_link_url();
        record_step(self.name(), result, STEP_LINK_URL, probe);

        let (_status, probe) = session.identity_link_status(&caller);
        record_step(self.name(), result, STEP_LINK_STATUS, probe);
        Ok(())
    }
}
