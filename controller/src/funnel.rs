/*!

The event funnel turns change notifications for every watched kind into a single trigger on the
work queue. Notifications carry no information that the engine uses; each pass re-reads
everything from the cache. The funnel only decides whether a notification could possibly matter.

!*/

use crate::constants::WORKQUEUE_KEY;
use crate::queue::WorkQueue;
use kube::{Resource, ResourceExt};
use log::{debug, error, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A change to a watched object, as seen by the cache.
#[derive(Debug, Clone)]
pub enum Notification<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(DeletedObject<K>),
}

/// A deletion is either observed directly, or inferred when a relist no longer contains an object
/// the cache had. In the latter case the final state of the object is unknown and only the last
/// state the cache saw, if any, is available.
#[derive(Debug, Clone)]
pub enum DeletedObject<K> {
    Direct(Arc<K>),
    Tombstone {
        key: String,
        last_known: Option<Arc<K>>,
    },
}

impl<K> DeletedObject<K> {
    /// Recover the deleted object, if possible.
    pub fn into_object(self) -> Option<Arc<K>> {
        match self {
            DeletedObject::Direct(obj) => Some(obj),
            DeletedObject::Tombstone { key, last_known } => {
                if last_known.is_none() {
                    error!("error decoding object tombstone '{}', no last known state", key);
                } else {
                    trace!("recovered deleted object '{}' from tombstone", key);
                }
                last_known
            }
        }
    }
}

/// Describes a watched kind to the funnel.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WatchedKind {
    /// A name for log messages, e.g. `Deployment`.
    pub kind: &'static str,
    /// For kinds where the operator cares about exactly one object, the name of that object.
    pub only_name: Option<&'static str>,
}

impl WatchedKind {
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            only_name: None,
        }
    }

    pub const fn named(kind: &'static str, name: &'static str) -> Self {
        Self {
            kind,
            only_name: Some(name),
        }
    }
}

impl Display for WatchedKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Namespaces that are shared with the rest of the cluster, each with the names of the objects in
/// it that the operator reacts to. Everything else in these namespaces is churn that is not ours.
#[derive(Debug, Clone, Default)]
pub struct SharedNamespaces {
    allowed: BTreeMap<String, BTreeSet<String>>,
}

impl SharedNamespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// React to changes of `name` in the shared `namespace`.
    pub fn allow<S1, S2>(mut self, namespace: S1, name: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.allowed
            .entry(namespace.into())
            .or_default()
            .insert(name.into());
        self
    }

    /// Whether an object in `namespace` named `name` may trigger a reconciliation.
    fn permits(&self, namespace: Option<&str>, name: &str) -> bool {
        match namespace.and_then(|ns| self.allowed.get(ns)) {
            None => true,
            Some(names) => names.contains(name),
        }
    }
}

/// Posts the sentinel trigger for every relevant notification. Cheap to clone and safe to call
/// from any number of informer tasks at once.
#[derive(Clone)]
pub struct EventFunnel {
    queue: WorkQueue<&'static str>,
    shared_namespaces: Arc<SharedNamespaces>,
}

impl EventFunnel {
    pub fn new(queue: WorkQueue<&'static str>, shared_namespaces: SharedNamespaces) -> Self {
        Self {
            queue,
            shared_namespaces: Arc::new(shared_namespaces),
        }
    }

    /// Decide whether `notification` is relevant and, if so, trigger a reconciliation. Returns
    /// whether the trigger was posted.
    pub fn handle<K>(&self, watched: &WatchedKind, notification: Notification<K>) -> bool
    where
        K: Resource,
    {
        let (obj, event) = match notification {
            Notification::Added(obj) => (obj, "add"),
            Notification::Updated { old, new } => {
                if old.resource_version() == new.resource_version() {
                    // Periodic resync sends update events for all known objects. Two different
                    // versions of the same object always have different version tokens.
                    return false;
                }
                (new, "update")
            }
            Notification::Deleted(deleted) => match deleted.into_object() {
                Some(obj) => (obj, "delete"),
                None => return false,
            },
        };

        if !self.is_relevant(watched, obj.as_ref()) {
            return false;
        }

        debug!(
            "add event to workqueue due to {} {} ({})",
            watched,
            object_info(obj.as_ref()),
            event
        );
        self.queue.add(WORKQUEUE_KEY);
        true
    }

    fn is_relevant<K>(&self, watched: &WatchedKind, obj: &K) -> bool
    where
        K: Resource,
    {
        let name = obj.name_any();
        if let Some(only_name) = watched.only_name {
            if name != only_name {
                return false;
            }
        }
        self.shared_namespaces
            .permits(obj.meta().namespace.as_deref(), &name)
    }
}

/// A short description of an object for log messages.
pub(crate) fn object_info<K>(obj: &K) -> String
where
    K: Resource,
{
    let meta = obj.meta();
    let name = obj.name_any();
    match &meta.namespace {
        Some(namespace) => format!(
            "{}/{} (rv={})",
            namespace,
            name,
            meta.resource_version.as_deref().unwrap_or("")
        ),
        None => format!(
            "{} (rv={})",
            name,
            meta.resource_version.as_deref().unwrap_or("")
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::queue::{default_controller_rate_limiter, RateLimiterSettings};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use model::ClusterOperator;

    const CONFIG_MAPS: WatchedKind = WatchedKind::new("ConfigMap");
    const CLUSTER_OPERATORS: WatchedKind = WatchedKind::named("ClusterOperator", "image-registry");

    fn funnel() -> (EventFunnel, WorkQueue<&'static str>) {
        let queue = WorkQueue::new(
            "test",
            default_controller_rate_limiter(RateLimiterSettings::default()),
        );
        let funnel = EventFunnel::new(
            queue.clone(),
            SharedNamespaces::new().allow("kube-system", "cluster-config-v1"),
        );
        (funnel, queue)
    }

    fn config_map(namespace: &str, name: &str, rv: &str) -> Arc<ConfigMap> {
        Arc::new(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some(rv.to_string()),
                ..ObjectMeta::default()
            },
            ..ConfigMap::default()
        })
    }

    fn cluster_operator(name: &str) -> Arc<ClusterOperator> {
        let mut co = ClusterOperator::new(name, Default::default());
        co.metadata.resource_version = Some("1".to_string());
        Arc::new(co)
    }

    #[tokio::test]
    async fn add_enqueues_the_sentinel() {
        let (funnel, queue) = funnel();
        assert!(funnel.handle(
            &CONFIG_MAPS,
            Notification::Added(config_map("image-registry", "trusted-ca", "1"))
        ));
        assert_eq!(queue.get().await, Some(WORKQUEUE_KEY));
    }

    #[tokio::test]
    async fn resync_echo_is_suppressed() {
        let (funnel, queue) = funnel();
        let cm = config_map("image-registry", "trusted-ca", "7");
        assert!(!funnel.handle(
            &CONFIG_MAPS,
            Notification::Updated {
                old: cm.clone(),
                new: cm
            }
        ));
        assert!(queue.is_empty());

        assert!(funnel.handle(
            &CONFIG_MAPS,
            Notification::Updated {
                old: config_map("image-registry", "trusted-ca", "7"),
                new: config_map("image-registry", "trusted-ca", "8"),
            }
        ));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn shared_namespace_allow_list() {
        let (funnel, queue) = funnel();
        assert!(!funnel.handle(
            &CONFIG_MAPS,
            Notification::Added(config_map("kube-system", "coredns", "1"))
        ));
        assert!(queue.is_empty());
        assert!(funnel.handle(
            &CONFIG_MAPS,
            Notification::Added(config_map("kube-system", "cluster-config-v1", "1"))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn single_name_kinds_ignore_other_names() {
        let (funnel, queue) = funnel();
        assert!(!funnel.handle(
            &CLUSTER_OPERATORS,
            Notification::Added(cluster_operator("dns"))
        ));
        assert!(queue.is_empty());
        assert!(funnel.handle(
            &CLUSTER_OPERATORS,
            Notification::Deleted(DeletedObject::Direct(cluster_operator("image-registry")))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn tombstones_are_unwrapped() {
        let (funnel, queue) = funnel();
        assert!(funnel.handle(
            &CONFIG_MAPS,
            Notification::Deleted(DeletedObject::Tombstone {
                key: "image-registry/trusted-ca".to_string(),
                last_known: Some(config_map("image-registry", "trusted-ca", "3")),
            })
        ));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn tombstones_without_state_are_skipped() {
        let (funnel, queue) = funnel();
        assert!(!funnel.handle::<ConfigMap>(
            &CONFIG_MAPS,
            Notification::Deleted(DeletedObject::Tombstone {
                key: "image-registry/trusted-ca".to_string(),
                last_known: None,
            })
        ));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn many_notifications_coalesce() {
        let (funnel, queue) = funnel();
        for i in 0..100 {
            funnel.handle(
                &CONFIG_MAPS,
                Notification::Added(config_map("image-registry", "trusted-ca", &i.to_string())),
            );
        }
        assert_eq!(queue.len(), 1);
    }
}
