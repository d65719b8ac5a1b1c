use crate::core::config::{PipelineConfig, ProfileBranch};
use crate::core::interfaces::ProfileHandlers;
use crate::core::models::BuildResult;
use crate::utils::{Logger, Result};

/// Hand a finished build to whichever branch the configuration carries.
///
/// The branch is matched once; the other handler is never reached.
pub async fn dispatch(
    config: &PipelineConfig,
    result: &BuildResult,
    handlers: &dyn ProfileHandlers,
) -> Result<()> {
    match &config.branch {
        ProfileBranch::Production(settings) => {
            Logger::debug("Running production finalizer");
            handlers.finalize(config, settings, result).await
        }
        ProfileBranch::Development(settings) => {
            Logger::debug("Starting development server");
            handlers.serve(config, settings).await
        }
    }
}
