use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The cluster-wide status mirror. Every operator in a cluster reports through one of these, so
/// the registry operator only cares about the one named `image-registry`. It is written by a
/// sibling controller; the reconciliation engine only watches it.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "config.operator.dev",
    kind = "ClusterOperator",
    plural = "clusteroperators",
    singular = "clusteroperator",
    status = "ClusterOperatorStatus",
    version = "v1"
)]
pub struct ClusterOperatorSpec {}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Operand versions, keyed by operand name.
    #[serde(default)]
    pub versions: Vec<OperandVersion>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}
