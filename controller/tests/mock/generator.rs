use super::api_error;
use controller::generator::{GeneratorError, GeneratorResult, ResourceGenerator, Teardown};
use model::ImageRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Call {
    Apply,
    Remove,
    Finalize,
}

/// Holds `apply` until the test releases it.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    pub(crate) entered: Arc<Notify>,
    pub(crate) release: Arc<Notify>,
}

struct Settings {
    teardown: Teardown,
    fail: bool,
    delay: Option<Duration>,
    gate: Option<Gate>,
}

struct Inner {
    calls: Mutex<Vec<Call>>,
    settings: Mutex<Settings>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Pretends to create and delete the registry deployment. Like the real generator, it refuses to
/// apply a registry that has no storage.
#[derive(Clone)]
pub(crate) struct MockGenerator {
    inner: Arc<Inner>,
}

impl MockGenerator {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                settings: Mutex::new(Settings {
                    teardown: Teardown::Complete,
                    fail: false,
                    delay: None,
                    gate: None,
                }),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.inner.calls.lock().unwrap().clear()
    }

    pub(crate) fn set_teardown(&self, teardown: Teardown) {
        self.inner.settings.lock().unwrap().teardown = teardown;
    }

    /// Make every call fail with an API error.
    pub(crate) fn set_failing(&self, fail: bool) {
        self.inner.settings.lock().unwrap().fail = fail;
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.inner.settings.lock().unwrap().delay = Some(delay);
    }

    pub(crate) fn install_gate(&self) -> Gate {
        let gate = Gate::default();
        self.inner.settings.lock().unwrap().gate = Some(gate.clone());
        gate
    }

    pub(crate) fn remove_gate(&self) {
        self.inner.settings.lock().unwrap().gate = None;
    }

    /// The most calls that were ever running at the same time.
    pub(crate) fn max_active(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    async fn call(&self, call: Call) -> GeneratorResult<()> {
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_active.fetch_max(active, Ordering::SeqCst);
        self.inner.calls.lock().unwrap().push(call);

        let (fail, delay, gate) = {
            let settings = self.inner.settings.lock().unwrap();
            (settings.fail, settings.delay, settings.gate.clone())
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        if fail {
            return Err(GeneratorError::KubeApi {
                action: "apply",
                kind: "Deployment",
                name: "image-registry".to_string(),
                source: api_error(500, "InternalError"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceGenerator for MockGenerator {
    async fn apply(&self, registry: &ImageRegistry) -> GeneratorResult<()> {
        self.call(Call::Apply).await?;
        if !registry.spec.storage.is_configured() {
            return Err(GeneratorError::StorageNotConfigured);
        }
        Ok(())
    }

    async fn remove(&self, _: &ImageRegistry) -> GeneratorResult<()> {
        self.call(Call::Remove).await
    }

    async fn finalize(&self, _: &ImageRegistry) -> GeneratorResult<Teardown> {
        self.call(Call::Finalize).await?;
        Ok(self.inner.settings.lock().unwrap().teardown)
    }
}
