/*!

The engine never talks to Kubernetes directly. It reads through a [`Listers`] cache and writes
through a [`RegistryStore`]. Both are traits so that mock implementations can be injected for
testing; in practice the [`KubeListers`] and [`KubeRegistryStore`] are used.

!*/

mod error;
mod listers;
mod store;

pub use error::{ListerError, ListerResult, StoreError, StoreResult};
pub use listers::KubeListers;
pub use store::KubeRegistryStore;

use k8s_openapi::api::apps::v1::Deployment;
use model::ImageRegistry;
use std::sync::Arc;

/// Writes to the remote object store. Every update is conditional: the object passed in carries
/// the version token it was read with and the store rejects it with [`StoreError::Conflict`] if
/// someone else wrote in the meantime.
#[async_trait::async_trait]
pub trait RegistryStore: Send + Sync {
    /// Create the `ImageRegistry`. Fails with [`StoreError::AlreadyExists`] if it exists.
    async fn create(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry>;

    /// Replace the metadata and spec of the `ImageRegistry`. The returned object carries the new
    /// version token.
    async fn update(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry>;

    /// Replace the status of the `ImageRegistry`. The returned object carries the new version
    /// token.
    async fn update_status(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry>;
}

/// Read-only access to the local cache of watched objects. A missing object is `Ok(None)`, not an
/// error. Returned objects are shared with the cache and must be cloned before they are changed.
pub trait Listers: Send + Sync {
    fn registry(&self, name: &str) -> ListerResult<Option<Arc<ImageRegistry>>>;

    /// Get a deployment from the operator namespace.
    fn deployment(&self, name: &str) -> ListerResult<Option<Arc<Deployment>>>;
}
