use super::{FlowContext, FlowError, FlowReporter, record_step};
use crate::probe::FlowResult;

pub const STEP_RESOLVER: &str = "martha";

pub struct ResolverFlow {
    context: FlowContext,
}

impl ResolverFlow {
    pub fn new(context: FlowContext) -> Self {
        Self { context }
    }
}

impl FlowReporter for ResolverFlow {
    fn name(&self) -> &'static str {
        "resolver"
    }

    fn output_name(&self) -> &'static str {
        "martha_response_time.csv"
    }

    fn context(&self) -> &FlowContext {
        &self.context
    }

    fn run(&self, result: &mut FlowResult) -> Result<(), FlowError> {
        let caller = self.context.caller_token()?;
        let mut session = self.context.session()?;

        let (_resolved, probe) =
            session.resolver_lookup(&caller, &self.context.config.default_object_uri);
        record_step(self.name(), result, STEP_RESOLVER, probe);
        Ok(())
    }
}
