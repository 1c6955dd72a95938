/*!

An informer keeps a local cache of one kind of object current by watching the Kubernetes API, and
reports every change it applies to the cache to the [`EventFunnel`]. Changes are derived by
comparing each watch event with the cache before the event is applied, so that an update can be
told apart from an add, and objects that vanished during a relist are reported as tombstones.

!*/

use crate::constants::WATCH_ERROR_DELAY;
use crate::funnel::{DeletedObject, EventFunnel, Notification, WatchedKind};
use futures::StreamExt;
use kube::{Api, Resource};
use kube_runtime::reflector::store::Writer;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::watcher::{self, watcher};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// A read handle to an informer's cache.
pub struct Cache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    store: Store<K>,
    synced: watch::Receiver<bool>,
}

impl<K> Clone for Cache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            synced: self.synced.clone(),
        }
    }
}

impl<K> Cache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    pub(crate) fn new(store: Store<K>, synced: watch::Receiver<bool>) -> Self {
        Self { store, synced }
    }

    pub fn get(&self, key: &ObjectRef<K>) -> Option<Arc<K>> {
        self.store.get(key)
    }

    /// Whether the initial list has been applied to the cache.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Wait until the initial list has been applied. Returns `false` if the informer stopped
    /// before that happened.
    pub async fn wait_for_sync(&self) -> bool {
        let mut synced = self.synced.clone();
        loop {
            if *synced.borrow_and_update() {
                return true;
            }
            if synced.changed().await.is_err() {
                return *synced.borrow();
            }
        }
    }
}

pub struct Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    api: Api<K>,
    config: watcher::Config,
    watched: WatchedKind,
    writer: Writer<K>,
    synced: watch::Sender<bool>,
    resync_period: Duration,
}

impl<K> Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    pub fn new(
        api: Api<K>,
        config: watcher::Config,
        watched: WatchedKind,
        resync_period: Duration,
    ) -> (Self, Cache<K>) {
        let writer = Writer::default();
        let (synced, synced_rx) = watch::channel(false);
        let cache = Cache::new(writer.as_reader(), synced_rx);
        (
            Self {
                api,
                config,
                watched,
                writer,
                synced,
                resync_period,
            },
            cache,
        )
    }

    /// Watch until the watch stream ends or the task is aborted.
    pub async fn run(mut self, funnel: EventFunnel) {
        info!("starting informer for {}", self.watched);
        let mut events = watcher(self.api.clone(), self.config.clone()).boxed();
        let mut resync =
            tokio::time::interval_at(Instant::now() + self.resync_period, self.resync_period);
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => self.apply(&funnel, event),
                    Some(Err(e)) => {
                        warn!("watch of {} failed, retrying: {}", self.watched, e);
                        tokio::time::sleep(WATCH_ERROR_DELAY).await;
                    }
                    None => {
                        warn!("watch stream of {} ended", self.watched);
                        return;
                    }
                },
                _ = resync.tick() => self.resync(&funnel),
            }
        }
    }

    fn apply(&mut self, funnel: &EventFunnel, event: watcher::Event<K>) {
        let notifications = notifications(&self.writer.as_reader(), &event);
        self.writer.apply_watcher_event(&event);
        if let watcher::Event::Restarted(objects) = &event {
            debug!("{} cache relisted with {} objects", self.watched, objects.len());
            self.synced.send_replace(true);
        }
        for notification in notifications {
            funnel.handle(&self.watched, notification);
        }
    }

    /// Replay the cache as updates that did not change anything.
    fn resync(&self, funnel: &EventFunnel) {
        for obj in self.writer.as_reader().state() {
            funnel.handle(
                &self.watched,
                Notification::Updated {
                    old: Arc::clone(&obj),
                    new: obj,
                },
            );
        }
    }
}

/// The watch configuration for `watched`. Kinds where only one object matters are narrowed to
/// that object by the API server.
pub(crate) fn watch_config(watched: &WatchedKind) -> watcher::Config {
    match watched.only_name {
        Some(name) => watcher::Config::default().fields(&format!("metadata.name={}", name)),
        None => watcher::Config::default(),
    }
}

/// Work out what `event` changes in `cache`.
pub(crate) fn notifications<K>(cache: &Store<K>, event: &watcher::Event<K>) -> Vec<Notification<K>>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    match event {
        watcher::Event::Applied(obj) => vec![applied(cache, obj)],
        watcher::Event::Deleted(obj) => {
            vec![Notification::Deleted(DeletedObject::Direct(Arc::new(
                obj.clone(),
            )))]
        }
        watcher::Event::Restarted(objects) => {
            let listed: HashSet<ObjectRef<K>> = objects.iter().map(ObjectRef::from_obj).collect();
            let mut notifications: Vec<_> = objects.iter().map(|obj| applied(cache, obj)).collect();
            // Anything the cache had that the relist does not was deleted while we were not
            // watching; all we know is the last state we saw.
            notifications.extend(
                cache
                    .state()
                    .into_iter()
                    .filter(|old| !listed.contains(&ObjectRef::from_obj(old.as_ref())))
                    .map(|old| {
                        Notification::Deleted(DeletedObject::Tombstone {
                            key: ObjectRef::from_obj(old.as_ref()).to_string(),
                            last_known: Some(old),
                        })
                    }),
            );
            notifications
        }
    }
}

fn applied<K>(cache: &Store<K>, obj: &K) -> Notification<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    let new = Arc::new(obj.clone());
    match cache.get(&ObjectRef::from_obj(obj)) {
        Some(old) => Notification::Updated { old, new },
        None => Notification::Added(new),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret(name: &str, rv: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("image-registry".to_string()),
                resource_version: Some(rv.to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    fn rv<K: Resource>(obj: &K) -> Option<String> {
        obj.meta().resource_version.clone()
    }

    #[test]
    fn applied_is_add_or_update() {
        let mut writer = Writer::<Secret>::default();
        let reader = writer.as_reader();

        let event = watcher::Event::Applied(secret("a", "1"));
        let ns = notifications(&reader, &event);
        assert!(matches!(ns.as_slice(), [Notification::Added(_)]));
        writer.apply_watcher_event(&event);

        let event = watcher::Event::Applied(secret("a", "2"));
        match notifications(&reader, &event).as_slice() {
            [Notification::Updated { old, new }] => {
                assert_eq!(rv(old.as_ref()).as_deref(), Some("1"));
                assert_eq!(rv(new.as_ref()).as_deref(), Some("2"));
            }
            other => panic!("unexpected notifications {:?}", other),
        }
    }

    #[test]
    fn deleted_is_direct() {
        let reader = Writer::<Secret>::default().as_reader();
        let event = watcher::Event::Deleted(secret("a", "3"));
        assert!(matches!(
            notifications(&reader, &event).as_slice(),
            [Notification::Deleted(DeletedObject::Direct(_))]
        ));
    }

    #[test]
    fn relist_reports_vanished_objects_as_tombstones() {
        let mut writer = Writer::<Secret>::default();
        let reader = writer.as_reader();
        writer.apply_watcher_event(&watcher::Event::Restarted(vec![
            secret("a", "1"),
            secret("b", "1"),
        ]));

        let event = watcher::Event::Restarted(vec![secret("a", "1"), secret("c", "1")]);
        let ns = notifications(&reader, &event);
        assert_eq!(ns.len(), 3);
        let mut added = 0;
        let mut echoes = 0;
        let mut tombstones = 0;
        for n in ns {
            match n {
                Notification::Added(obj) => {
                    assert_eq!(obj.metadata.name.as_deref(), Some("c"));
                    added += 1;
                }
                Notification::Updated { old, new } => {
                    assert_eq!(rv(old.as_ref()), rv(new.as_ref()));
                    echoes += 1;
                }
                Notification::Deleted(DeletedObject::Tombstone { last_known, .. }) => {
                    let last_known = last_known.unwrap();
                    assert_eq!(last_known.metadata.name.as_deref(), Some("b"));
                    tombstones += 1;
                }
                Notification::Deleted(DeletedObject::Direct(_)) => panic!("unexpected delete"),
            }
        }
        assert_eq!((added, echoes, tombstones), (1, 1, 1));
    }

    #[tokio::test]
    async fn cache_sync_state() {
        let writer = Writer::<Secret>::default();
        let (tx, rx) = watch::channel(false);
        let cache = Cache::new(writer.as_reader(), rx);
        assert!(!cache.has_synced());
        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_for_sync().await })
        };
        tx.send_replace(true);
        assert!(waiter.await.unwrap());
        assert!(cache.has_synced());
    }

    #[tokio::test]
    async fn wait_for_sync_gives_up_when_informer_stops() {
        let writer = Writer::<Secret>::default();
        let (tx, rx) = watch::channel(false);
        let cache = Cache::new(writer.as_reader(), rx);
        drop(tx);
        assert!(!cache.wait_for_sync().await);
    }

    #[test]
    fn singleton_kinds_are_narrowed_by_name() {
        let config = watch_config(&WatchedKind::named("ClusterOperator", "image-registry"));
        assert_eq!(
            config.field_selector.as_deref(),
            Some("metadata.name=image-registry")
        );
        assert_eq!(config.label_selector, None);

        let config = watch_config(&WatchedKind::new("Deployment"));
        assert_eq!(config.field_selector, None);
    }
}
