/*!

This test module provides a fake cluster that implements both the [`RegistryStore`] and the
[`Listers`], and a mock [`ResourceGenerator`], so that reconciliation passes can be tested without
Kubernetes.

The fake cluster behaves like the API server where it matters to the engine: writes are
conditional on the version token, a spec change bumps the generation, updates do not touch the
status and status updates touch nothing else, and an object whose deletion was requested is gone
as soon as its last finalizer is removed. Its "cache" is always in sync with its "server".

!*/

pub(crate) mod cluster;
pub(crate) mod generator;

use controller::constants::WORKQUEUE_NAME;
use controller::queue::{default_controller_rate_limiter, RateLimiterSettings, WorkQueue};
use controller::Controller;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::error::ErrorResponse;
use model::{find_condition, ConditionStatus, ImageRegistry, ImageRegistrySpec, RegistryStorage};
use std::sync::Arc;

pub(crate) use cluster::{FakeCluster, Write};
pub(crate) use generator::{Call, MockGenerator};

pub(crate) type TestController = Controller<FakeCluster, FakeCluster, MockGenerator>;

pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} error", reason),
        reason: reason.to_string(),
        code,
    })
}

pub(crate) fn queue() -> WorkQueue<&'static str> {
    WorkQueue::new(
        WORKQUEUE_NAME,
        default_controller_rate_limiter(RateLimiterSettings::default()),
    )
}

/// A controller that bootstraps a registry with working storage.
pub(crate) fn controller(cluster: &FakeCluster, generator: &MockGenerator) -> TestController {
    controller_without_storage(cluster, generator).with_bootstrap_spec(ImageRegistrySpec {
        storage: RegistryStorage::empty_dir(),
        ..ImageRegistrySpec::default()
    })
}

/// A controller that bootstraps a registry without storage.
pub(crate) fn controller_without_storage(
    cluster: &FakeCluster,
    generator: &MockGenerator,
) -> TestController {
    Controller::new(cluster.clone(), cluster.clone(), generator.clone(), queue())
}

/// The status and reason of a condition of the registry.
pub(crate) fn condition(
    registry: &ImageRegistry,
    type_: &str,
) -> Option<(ConditionStatus, String)> {
    let status = registry.status.as_ref()?;
    find_condition(&status.conditions, type_)
        .map(|c| (c.status, c.reason.clone().unwrap_or_default()))
}

pub(crate) fn config_map(name: &str, version: usize) -> Arc<ConfigMap> {
    Arc::new(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("image-registry".to_string()),
            resource_version: Some(version.to_string()),
            ..ObjectMeta::default()
        },
        ..ConfigMap::default()
    })
}
