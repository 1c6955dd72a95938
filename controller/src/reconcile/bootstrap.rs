use crate::clients::RegistryStore;
use crate::error::{self, Result};
use log::{debug, info};
use model::constants::REGISTRY_RESOURCE_NAME;
use model::{ImageRegistry, ImageRegistrySpec};
use snafu::ResultExt;

/// Create the `ImageRegistry` with the default spec. Losing a race with another creator is fine,
/// the next pass will find the object in the cache.
pub(super) async fn bootstrap<S>(store: &S, spec: &ImageRegistrySpec) -> Result<()>
where
    S: RegistryStore,
{
    info!(
        "ImageRegistry '{}' does not exist, creating the default",
        REGISTRY_RESOURCE_NAME
    );
    match store.create(&ImageRegistry::bootstrap(spec.clone())).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_already_exists() => {
            debug!("{}", e);
            Ok(())
        }
        Err(e) => Err(e).context(error::BootstrapSnafu),
    }
}
