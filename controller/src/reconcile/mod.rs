/*!

The reconciliation engine. Every pass starts from whatever the cache says now and computes the
whole desired state again; the trigger that started the pass carries no information. Passes are
handed out by the work queue, which never hands out the sentinel key to a second consumer while a
pass is running, so at most one writer of the `ImageRegistry` is in flight in this process.

A pass ends with at most two writes: one conditional update of metadata and spec, and one
conditional update of the status. Both are skipped when nothing changed.

!*/

mod bootstrap;
mod finalizer;
mod outcome;
mod status;

pub use outcome::{ApplyError, ApplyResult, PermanentReason};

use crate::clients::{Listers, RegistryStore};
use crate::constants::WORKQUEUE_KEY;
use crate::diff::object_diff;
use crate::error::{self, Result};
use crate::generator::ResourceGenerator;
use crate::queue::WorkQueue;
use bootstrap::bootstrap;
use finalizer::finalize;
use log::{debug, error, info, warn};
use model::constants::{FINALIZER_REGISTRY, REGISTRY_NAME, REGISTRY_RESOURCE_NAME};
use model::{CrdExt, ImageRegistry, ImageRegistrySpec, ManagementState};
use snafu::ResultExt;
use status::sync_status;

pub struct Controller<S, L, G> {
    store: S,
    listers: L,
    generator: G,
    queue: WorkQueue<&'static str>,
    bootstrap_spec: ImageRegistrySpec,
}

impl<S, L, G> Controller<S, L, G>
where
    S: RegistryStore,
    L: Listers,
    G: ResourceGenerator,
{
    /// Create the controller and queue its first pass, so that it runs even if nothing changes.
    pub fn new(store: S, listers: L, generator: G, queue: WorkQueue<&'static str>) -> Self {
        queue.add_rate_limited(WORKQUEUE_KEY);
        Self {
            store,
            listers,
            generator,
            queue,
            bootstrap_spec: ImageRegistrySpec::default(),
        }
    }

    /// The spec of the `ImageRegistry` that is created when none exists.
    pub fn with_bootstrap_spec(mut self, spec: ImageRegistrySpec) -> Self {
        self.bootstrap_spec = spec;
        self
    }

    pub fn queue(&self) -> &WorkQueue<&'static str> {
        &self.queue
    }

    /// Process passes until the queue shuts down.
    pub async fn run_processor(&self) {
        while self.process_next().await {}
        info!("{} processor stopped", self.queue.name());
    }

    /// Wait for the next trigger and run one pass. Returns `false` once the queue shuts down.
    pub async fn process_next(&self) -> bool {
        let key = match self.queue.get().await {
            Some(key) => key,
            None => return false,
        };
        debug!("get event from workqueue");

        match self.sync().await {
            Ok(()) => {
                self.queue.forget(&key);
                info!("event from workqueue successfully processed");
            }
            Err(e) => {
                if e.is_conflict() {
                    debug!("unable to sync: {}, requeuing", e);
                } else {
                    error!("unable to sync: {}, requeuing", e);
                }
                self.queue.add_rate_limited(key);
            }
        }
        self.queue.done(&key);
        true
    }

    /// Run one reconciliation pass.
    pub async fn sync(&self) -> Result<()> {
        let cached = self
            .listers
            .registry(REGISTRY_RESOURCE_NAME)
            .context(error::GetRegistrySnafu {
                name: REGISTRY_RESOURCE_NAME,
            })?;
        // The cached object is shared and never changes, it serves as the snapshot to diff
        // against.
        let previous = match cached {
            None => return bootstrap(&self.store, &self.bootstrap_spec).await,
            Some(previous) => previous,
        };
        let mut registry = previous.as_ref().clone();

        if registry.is_delete_requested() {
            return finalize(&self.store, &self.generator, registry).await;
        }

        registry.add_finalizer(FINALIZER_REGISTRY);
        let applied = self.apply_management_state(&registry).await;

        let deployment = self
            .listers
            .deployment(REGISTRY_NAME)
            .context(error::GetDeploymentSnafu {
                name: REGISTRY_NAME,
            })?;
        sync_status(&mut registry, deployment.as_deref(), &applied);

        self.persist(&previous, registry).await?;

        match applied {
            Ok(()) => Ok(()),
            Err(e) if e.is_permanent() => {
                warn!(
                    "ImageRegistry '{}' cannot be reconciled until its spec changes: {}",
                    REGISTRY_RESOURCE_NAME, e
                );
                Ok(())
            }
            Err(e) => Err(e).context(error::ApplySnafu {
                name: REGISTRY_RESOURCE_NAME,
            }),
        }
    }

    async fn apply_management_state(&self, registry: &ImageRegistry) -> ApplyResult {
        match registry.management_state() {
            ManagementState::Managed => {
                registry.spec.verify()?;
                self.generator.apply(registry).await?;
            }
            ManagementState::Removed => self.generator.remove(registry).await?,
            ManagementState::Unmanaged => {}
            ManagementState::Unknown(state) => {
                warn!(
                    "unknown management state '{}' in ImageRegistry '{}', ignoring",
                    state,
                    registry.object_name()
                );
            }
        }
        Ok(())
    }

    /// Write whatever changed in `registry` compared to `previous`.
    async fn persist(&self, previous: &ImageRegistry, mut registry: ImageRegistry) -> Result<()> {
        let name = registry.object_name().to_owned();

        if registry.metadata != previous.metadata || registry.spec != previous.spec {
            match object_diff(previous, &registry) {
                Ok(diff) => info!("object changed: ImageRegistry '{}':\n{}", name, diff),
                Err(e) => error!("unable to diff ImageRegistry '{}': {}", name, e),
            }
            let updated = self.store.update(&registry).await.map_err(|e| {
                if !e.is_conflict() {
                    error!("unable to update ImageRegistry '{}': {}", name, e);
                }
                e
            });
            let updated = updated.context(error::UpdateRegistrySnafu { name: &name })?;
            registry.metadata.resource_version = updated.metadata.resource_version;
        }

        if registry.status != previous.status {
            self.store
                .update_status(&registry)
                .await
                .map_err(|e| {
                    if !e.is_conflict() {
                        error!("unable to update status of ImageRegistry '{}': {}", name, e);
                    }
                    e
                })
                .context(error::UpdateStatusSnafu { name: &name })?;
        }
        Ok(())
    }
}
