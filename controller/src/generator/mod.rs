/*!

The resource generator renders the `ImageRegistry` into the dependent objects that make up the
registry, and creates, updates or deletes them. The engine only cares whether it succeeded, and if
not, whether the failure is the "storage not configured" signal.

!*/

mod error;
mod kube_generator;

pub use self::error::{GeneratorError, GeneratorResult};
pub use self::kube_generator::KubeGenerator;

use model::ImageRegistry;

/// Whether the teardown that a finalizer guards has finished.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Teardown {
    /// Every dependent object is gone, the finalizer may be removed.
    Complete,
    /// Deletion has been requested but has not finished yet.
    Pending,
}

#[async_trait::async_trait]
pub trait ResourceGenerator: Send + Sync {
    /// Create or update the dependent objects so that they match `registry`. Fails with
    /// [`GeneratorError::StorageNotConfigured`] when the registry has nowhere to store images.
    async fn apply(&self, registry: &ImageRegistry) -> GeneratorResult<()>;

    /// Delete the dependent objects.
    async fn remove(&self, registry: &ImageRegistry) -> GeneratorResult<()>;

    /// Drive the teardown of the dependent objects of a registry that is being deleted. Called
    /// again on every pass until it reports [`Teardown::Complete`].
    async fn finalize(&self, registry: &ImageRegistry) -> GeneratorResult<Teardown>;
}
