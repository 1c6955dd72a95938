use crate::clients::RegistryStore;
use crate::error::{self, Result};
use crate::generator::{ResourceGenerator, Teardown};
use log::{debug, info};
use model::constants::FINALIZER_REGISTRY;
use model::{CrdExt, ImageRegistry};
use snafu::{ensure, ResultExt};

/// Tear down a registry whose deletion has been requested. May run any number of times; the
/// finalizer is only removed, with a single conditional update, once the generator reports that
/// the teardown is complete.
pub(super) async fn finalize<S, G>(store: &S, generator: &G, mut registry: ImageRegistry) -> Result<()>
where
    S: RegistryStore,
    G: ResourceGenerator,
{
    let name = registry.object_name().to_owned();
    if !registry.has_finalizer(FINALIZER_REGISTRY) {
        debug!(
            "ImageRegistry '{}' is being deleted and has no '{}' finalizer",
            name, FINALIZER_REGISTRY
        );
        return Ok(());
    }

    let teardown = generator
        .finalize(&registry)
        .await
        .context(error::FinalizeSnafu { name: &name })?;
    ensure!(
        teardown == Teardown::Complete,
        error::TeardownPendingSnafu {
            name: &name,
            finalizer: FINALIZER_REGISTRY
        }
    );

    registry.remove_finalizer(FINALIZER_REGISTRY);
    store
        .update(&registry)
        .await
        .context(error::UpdateRegistrySnafu { name: &name })?;
    info!(
        "ImageRegistry '{}' torn down, removed finalizer '{}'",
        name, FINALIZER_REGISTRY
    );
    Ok(())
}
