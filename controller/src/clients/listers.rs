use super::error::{self, ListerResult};
use super::Listers;
use crate::informer::Cache;
use k8s_openapi::api::apps::v1::Deployment;
use kube_runtime::reflector::ObjectRef;
use model::ImageRegistry;
use snafu::ensure;
use std::sync::Arc;

/// The [`Listers`] backed by the informer caches.
#[derive(Clone)]
pub struct KubeListers {
    namespace: String,
    registries: Cache<ImageRegistry>,
    deployments: Cache<Deployment>,
}

impl KubeListers {
    pub fn new<S>(
        namespace: S,
        registries: Cache<ImageRegistry>,
        deployments: Cache<Deployment>,
    ) -> Self
    where
        S: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            registries,
            deployments,
        }
    }
}

impl Listers for KubeListers {
    fn registry(&self, name: &str) -> ListerResult<Option<Arc<ImageRegistry>>> {
        ensure!(
            self.registries.has_synced(),
            error::NotSyncedSnafu {
                kind: "ImageRegistry"
            }
        );
        Ok(self.registries.get(&ObjectRef::new(name)))
    }

    fn deployment(&self, name: &str) -> ListerResult<Option<Arc<Deployment>>> {
        ensure!(
            self.deployments.has_synced(),
            error::NotSyncedSnafu { kind: "Deployment" }
        );
        Ok(self
            .deployments
            .get(&ObjectRef::new(name).within(&self.namespace)))
    }
}
