/*!

Wires the pieces together: one informer per watched kind feeding the event funnel, the caches
behind the listers, and a single processor task draining the work queue.

!*/

use crate::clients::{KubeListers, KubeRegistryStore};
use crate::config::{ConfigError, OperatorConfig};
use crate::constants::WORKQUEUE_NAME;
use crate::funnel::{EventFunnel, SharedNamespaces, WatchedKind};
use crate::generator::KubeGenerator;
use crate::informer::{watch_config, Cache, Informer};
use crate::queue::{default_controller_rate_limiter, WorkQueue};
use crate::reconcile::Controller;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::{Api, Client, Resource};
use log::{error, info};
use model::constants::{
    CLUSTER_OPERATOR_NAME, INSTALLER_CONFIG_NAME, KUBE_SYSTEM_NAMESPACE,
    OPENSHIFT_CONFIG_NAMESPACE,
};
use model::{ClusterOperator, ImageRegistry};
use serde::de::DeserializeOwned;
use snafu::{ensure, ResultExt, Snafu};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Snafu)]
pub enum OperatorError {
    #[snafu(display("Invalid configuration: {}", source))]
    Config { source: ConfigError },

    #[snafu(display("Informer caches stopped before their initial list completed"))]
    CacheSync,
}

/// Run the operator until `shutdown` completes. The pass that is running when shutdown is
/// requested is allowed to finish.
pub async fn run<F>(client: Client, config: OperatorConfig, shutdown: F) -> Result<(), OperatorError>
where
    F: Future<Output = ()>,
{
    let bootstrap_spec = config.bootstrap_spec().context(ConfigSnafu)?;
    let namespace = config.namespace.as_str();

    let queue = WorkQueue::new(
        WORKQUEUE_NAME,
        default_controller_rate_limiter(config.rate_limiter_settings()),
    );
    let funnel = EventFunnel::new(
        queue.clone(),
        SharedNamespaces::new().allow(KUBE_SYSTEM_NAMESPACE, INSTALLER_CONFIG_NAME),
    );

    let mut informers = Informers::new(funnel, config.resync_period());
    let registries = informers.watch(
        Api::<ImageRegistry>::all(client.clone()),
        WatchedKind::new("ImageRegistry"),
    );
    informers.watch(
        Api::<ClusterOperator>::all(client.clone()),
        WatchedKind::named("ClusterOperator", CLUSTER_OPERATOR_NAME),
    );
    let deployments = informers.watch(
        Api::<Deployment>::namespaced(client.clone(), namespace),
        WatchedKind::new("Deployment"),
    );
    informers.watch(
        Api::<DaemonSet>::namespaced(client.clone(), namespace),
        WatchedKind::new("DaemonSet"),
    );
    informers.watch(
        Api::<Service>::namespaced(client.clone(), namespace),
        WatchedKind::new("Service"),
    );
    informers.watch(
        Api::<Secret>::namespaced(client.clone(), namespace),
        WatchedKind::new("Secret"),
    );
    informers.watch(
        Api::<ConfigMap>::namespaced(client.clone(), namespace),
        WatchedKind::new("ConfigMap"),
    );
    informers.watch(
        Api::<ServiceAccount>::namespaced(client.clone(), namespace),
        WatchedKind::new("ServiceAccount"),
    );
    informers.watch(
        Api::<Job>::namespaced(client.clone(), namespace),
        WatchedKind::new("Job"),
    );
    informers.watch(
        Api::<CronJob>::namespaced(client.clone(), namespace),
        WatchedKind::new("CronJob"),
    );
    informers.watch(
        Api::<ClusterRole>::all(client.clone()),
        WatchedKind::new("ClusterRole"),
    );
    informers.watch(
        Api::<ClusterRoleBinding>::all(client.clone()),
        WatchedKind::new("ClusterRoleBinding"),
    );
    informers.watch(
        Api::<ConfigMap>::namespaced(client.clone(), OPENSHIFT_CONFIG_NAMESPACE),
        WatchedKind::new("ConfigMap"),
    );
    informers.watch(
        Api::<ConfigMap>::namespaced(client.clone(), KUBE_SYSTEM_NAMESPACE),
        WatchedKind::new("ConfigMap"),
    );

    let controller = Arc::new(
        Controller::new(
            KubeRegistryStore::new(client.clone()),
            KubeListers::new(namespace, registries, deployments),
            KubeGenerator::new(client, namespace, config.registry_image.as_str()),
            queue.clone(),
        )
        .with_bootstrap_spec(bootstrap_spec),
    );

    tokio::pin!(shutdown);
    info!("waiting for informer caches to sync");
    let synced = tokio::select! {
        synced = informers.synced() => synced,
        _ = &mut shutdown => {
            info!("shutdown requested before informer caches synced");
            queue.shut_down();
            informers.abort();
            return Ok(());
        }
    };
    if !synced {
        queue.shut_down();
        informers.abort();
    }
    ensure!(synced, CacheSyncSnafu);

    info!("informer caches synced, starting {} processor", queue.name());
    let processor = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run_processor().await })
    };

    shutdown.await;
    info!("shutting down");
    queue.shut_down();
    if let Err(e) = processor.await {
        error!("{} processor task failed: {}", queue.name(), e);
    }
    informers.abort();
    Ok(())
}

/// The informer tasks and what is needed to wait for their caches.
struct Informers {
    funnel: EventFunnel,
    resync_period: Duration,
    tasks: Vec<JoinHandle<()>>,
    waiters: Vec<BoxFuture<'static, bool>>,
}

impl Informers {
    fn new(funnel: EventFunnel, resync_period: Duration) -> Self {
        Self {
            funnel,
            resync_period,
            tasks: Vec::new(),
            waiters: Vec::new(),
        }
    }

    /// Start an informer for the objects `api` can see.
    fn watch<K>(&mut self, api: Api<K>, watched: WatchedKind) -> Cache<K>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    {
        let config = watch_config(&watched);
        let (informer, cache) = Informer::new(api, config, watched, self.resync_period);
        self.tasks.push(tokio::spawn(informer.run(self.funnel.clone())));
        let waiter = cache.clone();
        self.waiters
            .push(async move { waiter.wait_for_sync().await }.boxed());
        cache
    }

    /// Resolves to `true` once every cache has synced, `false` if any informer stopped first.
    fn synced(&mut self) -> impl Future<Output = bool> {
        future::join_all(std::mem::take(&mut self.waiters))
            .map(|synced| synced.into_iter().all(|synced| synced))
    }

    fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
