/*!

This library provides the Kubernetes custom resource definitions used by the image registry
operator, along with helpers for working with their metadata and status.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use cluster_operator::{
    ClusterOperator, ClusterOperatorSpec, ClusterOperatorStatus, OperandVersion,
};
pub use condition::{find_condition, set_condition, Condition, ConditionStatus};
pub use crd_ext::CrdExt;
pub use error::{Error, Result};
pub use registry::{
    EmptyDirStorage, ImageRegistry, ImageRegistrySpec, ImageRegistryStatus, ManagementState,
    PvcStorage, RegistryStorage, S3Storage,
};

mod cluster_operator;
pub mod condition;
pub mod constants;
mod crd_ext;
mod error;
mod registry;
mod validation;
