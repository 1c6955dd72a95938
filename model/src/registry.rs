use crate::condition::Condition;
use crate::constants::REGISTRY_RESOURCE_NAME;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The desired state of the image registry. The `CustomResource` derive also produces a struct
/// named `ImageRegistry` which represents the CRD object in the k8s API. There is exactly one of
/// these in a cluster, named `cluster`.
#[derive(Clone, CustomResource, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "registry.operator.dev",
    kind = "ImageRegistry",
    plural = "imageregistries",
    singular = "imageregistry",
    status = "ImageRegistryStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistrySpec {
    /// Whether and how the operator manages the registry.
    #[schemars(with = "String")]
    pub management_state: ManagementState,
    /// The number of registry replicas to run.
    pub replicas: i32,
    /// The storage backend of the registry. At most one backend may be configured.
    #[serde(default)]
    pub storage: RegistryStorage,
    /// The log level of the registry process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ImageRegistry {
    /// The object the operator creates when no `ImageRegistry` exists yet. It deliberately has no
    /// finalizer; the first regular reconciliation adds it.
    pub fn bootstrap(spec: ImageRegistrySpec) -> Self {
        Self::new(REGISTRY_RESOURCE_NAME, spec)
    }

    /// The `ManagementState` requested by the spec.
    pub fn management_state(&self) -> &ManagementState {
        &self.spec.management_state
    }

    /// Returns a mutable reference to the status, creating a default one if it is missing.
    pub fn status_mut(&mut self) -> &mut ImageRegistryStatus {
        self.status.get_or_insert_with(ImageRegistryStatus::default)
    }
}

impl Default for ImageRegistrySpec {
    fn default() -> Self {
        Self {
            management_state: ManagementState::Managed,
            replicas: 1,
            storage: RegistryStorage::default(),
            log_level: None,
        }
    }
}

/// What the operator should do with the registry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManagementState {
    /// The operator keeps the registry deployed and up to date.
    Managed,
    /// The operator removes everything it created.
    Removed,
    /// The operator leaves the registry alone.
    Unmanaged,
    /// A value the operator does not understand. Carried verbatim so it can be reported.
    Unknown(String),
}

impl Default for ManagementState {
    fn default() -> Self {
        ManagementState::Managed
    }
}

impl From<String> for ManagementState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Managed" => ManagementState::Managed,
            "Removed" => ManagementState::Removed,
            "Unmanaged" => ManagementState::Unmanaged,
            _ => ManagementState::Unknown(s),
        }
    }
}

impl From<ManagementState> for String {
    fn from(state: ManagementState) -> Self {
        match state {
            ManagementState::Unknown(s) => s,
            known => known.to_string(),
        }
    }
}

impl Display for ManagementState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Removed => write!(f, "Removed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// The storage backends the registry can use.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PvcStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Storage>,
}

impl RegistryStorage {
    /// Ephemeral storage, only suitable for a single replica.
    pub fn empty_dir() -> Self {
        Self {
            empty_dir: Some(EmptyDirStorage {}),
            ..Self::default()
        }
    }

    /// The number of configured backends.
    pub fn configured_backends(&self) -> usize {
        [
            self.empty_dir.is_some(),
            self.pvc.is_some(),
            self.s3.is_some(),
        ]
        .iter()
        .filter(|configured| **configured)
        .count()
    }

    pub fn is_configured(&self) -> bool {
        self.configured_backends() > 0
    }
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
pub struct EmptyDirStorage {}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcStorage {
    /// The name of the persistent volume claim in the operator namespace.
    pub claim: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Storage {
    pub bucket: String,
    pub region: String,
}

/// The status field of the `ImageRegistry`. Only the operator writes here.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryStatus {
    /// The `metadata.generation` of the spec that the operator last acted on.
    #[serde(default)]
    pub observed_generation: i64,
    /// The number of ready registry pods.
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
