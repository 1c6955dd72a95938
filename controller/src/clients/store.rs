use super::error::{self, StoreError, StoreResult};
use super::RegistryStore;
use kube::api::PostParams;
use kube::Api;
use log::trace;
use model::{CrdExt, ImageRegistry};
use snafu::ResultExt;

/// The [`RegistryStore`] backed by the Kubernetes API. Optimistic concurrency comes for free: a
/// `replace` carrying a stale `metadata.resourceVersion` is rejected by the API server with a 409.
#[derive(Clone)]
pub struct KubeRegistryStore {
    api: Api<ImageRegistry>,
}

impl KubeRegistryStore {
    pub fn new(k8s_client: kube::Client) -> Self {
        Self {
            api: Api::all(k8s_client),
        }
    }
}

#[async_trait::async_trait]
impl RegistryStore for KubeRegistryStore {
    async fn create(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let name = registry.object_name();
        trace!("creating image registry '{}'", name);
        self.api
            .create(&PostParams::default(), registry)
            .await
            .map_err(|e| StoreError::from_kube("create", name, e))
    }

    async fn update(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let name = registry.object_name();
        trace!(
            "updating image registry '{}' at version {:?}",
            name,
            registry.version_token()
        );
        self.api
            .replace(name, &PostParams::default(), registry)
            .await
            .map_err(|e| StoreError::from_kube("update", name, e))
    }

    async fn update_status(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let name = registry.object_name();
        trace!(
            "updating status of image registry '{}' at version {:?}",
            name,
            registry.version_token()
        );
        let data = serde_json::to_vec(registry).context(error::SerializeSnafu { name })?;
        self.api
            .replace_status(name, &PostParams::default(), data)
            .await
            .map_err(|e| StoreError::from_kube("update status", name, e))
    }
}
