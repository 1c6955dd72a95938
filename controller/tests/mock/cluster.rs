use super::api_error;
use controller::clients::{ListerResult, Listers, RegistryStore, StoreError, StoreResult};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use model::{CrdExt, ImageRegistry, ImageRegistrySpec};
use std::sync::{Arc, Mutex, MutexGuard};

/// A successful write to the fake cluster.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Write {
    Create,
    Update,
    UpdateStatus,
}

impl Write {
    fn method(&self) -> &'static str {
        match self {
            Write::Create => "create",
            Write::Update => "update",
            Write::UpdateStatus => "update status",
        }
    }
}

#[derive(Default)]
struct State {
    registry: Option<ImageRegistry>,
    deployment: Option<Deployment>,
    version: u64,
    writes: Vec<Write>,
    /// Writes that will fail with a conflict the next time they are attempted.
    conflicts: Vec<Write>,
    stale_cache: bool,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn check_write(&mut self, write: Write, registry: &ImageRegistry) -> StoreResult<()> {
        let name = registry.object_name();
        let current = match &self.registry {
            None => {
                return Err(StoreError::from_kube(
                    write.method(),
                    name,
                    api_error(404, "NotFound"),
                ))
            }
            Some(current) => current.metadata.resource_version.clone(),
        };
        let injected = match self.conflicts.iter().position(|w| *w == write) {
            Some(index) => {
                self.conflicts.remove(index);
                true
            }
            None => false,
        };
        if injected || current != registry.metadata.resource_version {
            return Err(StoreError::from_kube(
                write.method(),
                name,
                api_error(409, "Conflict"),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// The `ImageRegistry` as the server has it.
    pub(crate) fn stored(&self) -> Option<ImageRegistry> {
        self.state().registry.clone()
    }

    pub(crate) fn writes(&self) -> Vec<Write> {
        self.state().writes.clone()
    }

    pub(crate) fn clear_writes(&self) {
        self.state().writes.clear()
    }

    /// Change the spec the way a user would.
    pub(crate) fn edit_spec<F>(&self, edit: F)
    where
        F: FnOnce(&mut ImageRegistrySpec),
    {
        let mut state = self.state();
        let version = state.next_version();
        let registry = state.registry.as_mut().unwrap();
        edit(&mut registry.spec);
        registry.metadata.generation = Some(registry.generation() + 1);
        registry.metadata.resource_version = Some(version);
    }

    pub(crate) fn request_deletion(&self) {
        let mut state = self.state();
        let version = state.next_version();
        let registry = state.registry.as_mut().unwrap();
        registry.metadata.deletion_timestamp = Some(Time(Utc::now()));
        registry.metadata.resource_version = Some(version);
    }

    pub(crate) fn set_deployment(&self, deployment: Option<Deployment>) {
        self.state().deployment = deployment;
    }

    /// Make the next write of the given kind fail as if someone else wrote first.
    pub(crate) fn inject_conflict(&self, write: Write) {
        self.state().conflicts.push(write);
    }

    /// Make the cache miss the `ImageRegistry` even if the server has it.
    pub(crate) fn set_cache_stale(&self, stale: bool) {
        self.state().stale_cache = stale;
    }
}

#[async_trait::async_trait]
impl RegistryStore for FakeCluster {
    async fn create(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let mut state = self.state();
        if state.registry.is_some() {
            return Err(StoreError::from_kube(
                "create",
                registry.object_name(),
                api_error(409, "AlreadyExists"),
            ));
        }
        let mut created = registry.clone();
        created.metadata.resource_version = Some(state.next_version());
        created.metadata.generation = Some(1);
        state.registry = Some(created.clone());
        state.writes.push(Write::Create);
        Ok(created)
    }

    async fn update(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let mut state = self.state();
        state.check_write(Write::Update, registry)?;
        let version = state.next_version();
        let mut current = state.registry.take().unwrap();
        if current.spec != registry.spec {
            current.metadata.generation = Some(current.generation() + 1);
        }
        current.spec = registry.spec.clone();
        current.metadata.finalizers = registry.metadata.finalizers.clone();
        current.metadata.resource_version = Some(version);
        state.writes.push(Write::Update);
        if !(current.is_delete_requested() && !current.has_finalizers()) {
            state.registry = Some(current.clone());
        }
        Ok(current)
    }

    async fn update_status(&self, registry: &ImageRegistry) -> StoreResult<ImageRegistry> {
        let mut state = self.state();
        state.check_write(Write::UpdateStatus, registry)?;
        let version = state.next_version();
        let current = state.registry.as_mut().unwrap();
        current.status = registry.status.clone();
        current.metadata.resource_version = Some(version);
        let updated = current.clone();
        state.writes.push(Write::UpdateStatus);
        Ok(updated)
    }
}

impl Listers for FakeCluster {
    fn registry(&self, name: &str) -> ListerResult<Option<Arc<ImageRegistry>>> {
        let state = self.state();
        if state.stale_cache {
            return Ok(None);
        }
        Ok(state
            .registry
            .as_ref()
            .filter(|registry| registry.object_name() == name)
            .map(|registry| Arc::new(registry.clone())))
    }

    fn deployment(&self, _: &str) -> ListerResult<Option<Arc<Deployment>>> {
        Ok(self.state().deployment.clone().map(Arc::new))
    }
}
