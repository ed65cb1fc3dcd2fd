use super::{FlowContext, FlowError, FlowReporter, record_step};
use crate::probe::FlowResult;
use crate::probe_ops::access_id_for_scheme;

pub const STEP_METADATA: &str = "indexd_get_metadata";
pub const STEP_SA_KEY: &str = "bond_get_sa_key";
pub const STEP_ACCESS_TOKEN: &str = "bond_get_access_token";
pub const STEP_SIGNED_URL: &str = "fence_get_signed_url";

/// Metadata resolution, service-account key, delegated token, then a signed
/// URL fetched with that token.
pub struct DrsAccessFlow {
    context: FlowContext,
}

impl DrsAccessFlow {
    pub fn new(context: FlowContext) -> Self {
        Self { context }
    }
}

impl FlowReporter for DrsAccessFlow {
    fn name(&self) -> &'static str {
        "drs_access"
    }

    fn output_name(&self) -> &'static str {
        "drs_flow_response_times.csv"
    }

    fn context(&self) -> &FlowContext {
        &self.context
    }

    fn run(&self, result: &mut FlowResult) -> Result<(), FlowError> {
        let caller = self.context.caller_token()?;
        let mut session = self.context.session()?;
        let config = &self.context.config;
        let object = &config.default_object_uri;

        let (metadata, probe) = session.resolve_metadata(object);
        record_step(self.name(), result, STEP_METADATA, probe);

        let (_key, probe) = session.service_account_key(&caller);
        record_step(self.name(), result, STEP_SA_KEY, probe);

        let (delegated, probe) = session.delegated_access_token(&caller);
        record_step(self.name(), result, STEP_ACCESS_TOKEN, probe);
        let Some(delegated) = delegated else {
            return Err(FlowError::Incomplete {
                step: STEP_SIGNED_URL,
                missing: "delegated access token",
            });
        };

        let scheme = &config.default_cloud_scheme;
        let access_id = metadata
            .as_ref()
            .and_then(|object| access_id_for_scheme(object, scheme))
            .unwrap_or_else(|| scheme.clone());
        let (_signed, probe) = session.signed_access_url(Some(&delegated), object, &access_id);
        record_step(self.name(), result, STEP_SIGNED_URL, probe);
        Ok(())
    }
}
