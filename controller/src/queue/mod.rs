/*!

A deduplicating, rate-limited work queue modeled on the client-go workqueue.

* An item is queued at most once, no matter how many times it is added before it is handed out.
* An item that is being processed is never handed out a second time. Adding it while it is being
  processed marks it dirty, and it is queued again exactly once when processing is [`done`].
* [`add_rate_limited`] delays the add by the rate limiter's backoff for that item, and
  [`forget`] resets the backoff.
* After [`shut_down`] adds are ignored and [`get`] returns `None`.

[`done`]: WorkQueue::done
[`add_rate_limited`]: WorkQueue::add_rate_limited
[`forget`]: WorkQueue::forget
[`shut_down`]: WorkQueue::shut_down
[`get`]: WorkQueue::get

!*/

mod rate_limiter;

pub use rate_limiter::{
    default_controller_rate_limiter, BucketRateLimiter, ExponentialFailureRateLimiter,
    MaxOfRateLimiter, RateLimiter, RateLimiterSettings,
};

use log::trace;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    name: String,
    state: Mutex<State<T>>,
    limiter: Mutex<Box<dyn RateLimiter<T>>>,
    notify: Notify,
}

struct State<T> {
    /// Items ready to be handed out, in order.
    queue: VecDeque<T>,
    /// Items that need processing, whether queued or waiting for processing to finish.
    dirty: HashSet<T>,
    /// Items that have been handed out and are not `done` yet.
    processing: HashSet<T>,
    shutting_down: bool,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new<S, R>(name: S, limiter: R) -> Self
    where
        S: Into<String>,
        R: RateLimiter<T> + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                limiter: Mutex::new(Box::new(limiter)),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue `item` unless it is already waiting. Never blocks on the consumer.
    pub fn add(&self, item: T) {
        let mut state = self.state();
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            trace!(
                "{}: {:?} is being processed, it will be queued again when done",
                self.name(),
                item
            );
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Queue `item` once `delay` has passed.
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Queue `item` after the rate limiter says it is ok.
    pub fn add_rate_limited(&self, item: T) {
        let delay = self.limiter().when(&item);
        trace!("{}: requeuing {:?} in {:?}", self.name(), item, delay);
        self.add_after(item, delay);
    }

    /// Clear the rate limiter's history of `item`.
    pub fn forget(&self, item: &T) {
        self.limiter().forget(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        self.limiter().num_requeues(item)
    }

    /// Wait for the next item. Returns `None` once the queue is shutting down. The caller must
    /// call [`WorkQueue::done`] with the item when it has finished processing it.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before looking at the state so that an add between the check and
            // the await is not missed.
            notified.as_mut().enable();
            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
            }
            notified.await;
        }
    }

    /// Mark `item` as no longer being processed. If it was added while it was being processed it
    /// is queued again now.
    pub fn done(&self, item: &T) {
        let mut state = self.state();
        state.processing.remove(item);
        if state.dirty.contains(item) && !state.shutting_down {
            state.queue.push_back(item.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Stop accepting items and release everyone waiting in [`WorkQueue::get`].
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// The number of items waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn limiter(&self) -> MutexGuard<'_, Box<dyn RateLimiter<T>>> {
        self.inner
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const KEY: &str = "changes";

    fn queue() -> WorkQueue<&'static str> {
        WorkQueue::new(
            "test",
            default_controller_rate_limiter(RateLimiterSettings::default()),
        )
    }

    #[tokio::test]
    async fn adds_are_deduplicated() {
        let q = queue();
        q.add(KEY);
        q.add(KEY);
        q.add(KEY);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get().await, Some(KEY));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn adds_during_processing_coalesce_into_one() {
        let q = queue();
        q.add(KEY);
        let item = q.get().await.unwrap();
        for _ in 0..50 {
            q.add(KEY);
        }
        // Not handed out again while it is being processed.
        assert!(q.is_empty());
        q.done(&item);
        assert_eq!(q.len(), 1);
        let item = q.get().await.unwrap();
        q.done(&item);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn get_waits_for_add() {
        let q = queue();
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::task::yield_now().await;
        q.add(KEY);
        assert_eq!(consumer.await.unwrap(), Some(KEY));
    }

    #[tokio::test]
    async fn shut_down_releases_consumers_and_rejects_adds() {
        let q = queue();
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::task::yield_now().await;
        q.shut_down();
        assert_eq!(consumer.await.unwrap(), None);
        q.add(KEY);
        assert!(q.is_empty());
        assert_eq!(q.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_add_is_delayed() {
        let q = queue();
        q.add_rate_limited(KEY);
        assert!(q.is_empty());
        assert_eq!(q.num_requeues(&KEY), 1);
        tokio::time::sleep(Duration::from_millis(6)).await;
        assert_eq!(q.len(), 1);

        q.forget(&KEY);
        assert_eq!(q.num_requeues(&KEY), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_add_after_shut_down_is_dropped() {
        let q = queue();
        q.add_after(KEY, Duration::from_secs(1));
        q.shut_down();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(q.is_empty());
    }
}
