use super::outcome::{ApplyError, ApplyResult};
use k8s_openapi::api::apps::v1::Deployment;
use model::condition::{
    CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_PROGRESSING, CONDITION_REMOVED,
};
use model::{set_condition, ConditionStatus, CrdExt, ImageRegistry, ManagementState};

/// Write the status the registry should have after this pass into `registry`. The deployment is
/// `None` when it does not exist.
pub(super) fn sync_status(
    registry: &mut ImageRegistry,
    deployment: Option<&Deployment>,
    applied: &ApplyResult,
) {
    let state = registry.management_state().clone();
    let desired_replicas = registry.spec.replicas;
    let generation = registry.generation();
    let status = registry.status_mut();

    match state {
        ManagementState::Managed => {
            let observed = DeploymentProgress::from(deployment);
            status.ready_replicas = observed.ready;
            let (available, reason, message) = match deployment {
                None => (false, "DeploymentNotFound", "The deployment does not exist"),
                Some(_) if observed.ready > 0 => (true, "Ready", "The registry is ready"),
                Some(_) => (
                    false,
                    "NoReplicasAvailable",
                    "The deployment does not have available replicas",
                ),
            };
            set_condition(
                &mut status.conditions,
                CONDITION_AVAILABLE,
                available.into(),
                reason,
                message,
            );
            let (progressing, reason, message) = match deployment {
                None => (true, "WaitingForDeployment", "The deployment is being created"),
                Some(_) if observed.rolled_out(desired_replicas) => {
                    (false, "Ready", "All registry resources are up to date")
                }
                Some(_) => (true, "DeploymentProgressing", "The deployment is rolling out"),
            };
            set_condition(
                &mut status.conditions,
                CONDITION_PROGRESSING,
                progressing.into(),
                reason,
                message,
            );
            set_condition(
                &mut status.conditions,
                CONDITION_REMOVED,
                ConditionStatus::False,
                "Managed",
                "The registry is managed",
            );
        }
        ManagementState::Removed => {
            status.ready_replicas = DeploymentProgress::from(deployment).ready;
            set_condition(
                &mut status.conditions,
                CONDITION_AVAILABLE,
                ConditionStatus::False,
                "Removed",
                "The registry is removed",
            );
            let (progressing, reason, message) = match deployment {
                Some(_) => (true, "DeletingDeployment", "The deployment is being deleted"),
                None => (false, "Removed", "All registry resources are removed"),
            };
            set_condition(
                &mut status.conditions,
                CONDITION_PROGRESSING,
                progressing.into(),
                reason,
                message,
            );
            set_condition(
                &mut status.conditions,
                CONDITION_REMOVED,
                ConditionStatus::True,
                "Removed",
                "The registry is removed",
            );
        }
        ManagementState::Unmanaged | ManagementState::Unknown(_) => {}
    }

    match applied {
        Ok(()) => set_condition(
            &mut status.conditions,
            CONDITION_DEGRADED,
            ConditionStatus::False,
            "AsExpected",
            "",
        ),
        Err(ApplyError::Permanent { reason, message }) => set_condition(
            &mut status.conditions,
            CONDITION_DEGRADED,
            ConditionStatus::True,
            reason.as_str(),
            message.as_str(),
        ),
        // Left alone so that a flaky API server does not flap the condition.
        Err(ApplyError::Transient { .. }) => {}
    }

    status.observed_generation = generation;
}

/// The replica counts of the registry deployment.
#[derive(Debug, Default, Clone, Copy)]
struct DeploymentProgress {
    ready: i32,
    updated: i32,
    replicas: i32,
    stale_generation: bool,
}

impl From<Option<&Deployment>> for DeploymentProgress {
    fn from(deployment: Option<&Deployment>) -> Self {
        let deployment = match deployment {
            None => return Self::default(),
            Some(deployment) => deployment,
        };
        let status = match &deployment.status {
            None => {
                return Self {
                    stale_generation: true,
                    ..Self::default()
                }
            }
            Some(status) => status,
        };
        Self {
            ready: status.ready_replicas.unwrap_or_default(),
            updated: status.updated_replicas.unwrap_or_default(),
            replicas: status.replicas.unwrap_or_default(),
            stale_generation: status.observed_generation < deployment.metadata.generation,
        }
    }
}

impl DeploymentProgress {
    fn rolled_out(&self, desired: i32) -> bool {
        !self.stale_generation
            && self.updated == desired
            && self.replicas == desired
            && self.ready == desired
    }
}
