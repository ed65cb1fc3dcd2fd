use super::{FlowContext, FlowError, FlowReporter, record_step};
use crate::probe::FlowResult;
use tracing::debug;

pub const STEP_USER_INFO: &str = "fence_user_info";

/// User-info lookup with a delegated token. The token fetch is not part of
/// the row; a missing token still sends the lookup so its rejection is
/// measured.
pub struct UserInfoFlow {
    context: FlowContext,
}

impl UserInfoFlow {
    pub fn new(context: FlowContext) -> Self {
        Self { context }
    }
}

impl FlowReporter for UserInfoFlow {
    fn name(&self) -> &'static str {
        "user_info"
    }

    fn output_name(&self) -> &'static str {
        "fence_user_info_response_time.csv"
    }

    fn context(&self) -> &FlowContext {
        &self.context
    }

    fn run(&self, result: &mut FlowResult) -> Result<(), FlowError> {
        let caller = self.context.caller_token()?;
        let mut session = self.context.session()?;

        let (delegated, probe) = session.delegated_access_token(&caller);
        if delegated.is_none() {
            debug!(
                flow = self.name(),
                status = ?probe.status_code,
                "no delegated token, sending user info unauthenticated"
            );
        }

        let (_info, probe) = session.user_info(delegated.as_ref());
        record_step(self.name(), result, STEP_USER_INFO, probe);
        Ok(())
    }
}
