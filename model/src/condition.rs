use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_DEGRADED: &str = "Degraded";
pub const CONDITION_REMOVED: &str = "Removed";

/// A single observation about the registry, in the style of Kubernetes status conditions.
#[derive(Clone, Debug, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When `status` last changed. Rewriting the same status leaves this alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, Eq, PartialEq, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl From<bool> for ConditionStatus {
    fn from(b: bool) -> Self {
        if b {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// Find the condition of the given type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or update the condition of the given type. The transition time is only moved when the
/// status actually changes so that repeated reconciliations of an unchanged world produce an
/// identical status.
pub fn set_condition<R, M>(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: R,
    message: M,
) where
    R: Into<String>,
    M: Into<String>,
{
    let reason = Some(reason.into());
    let message = Some(message.into());
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status != status {
                existing.status = status;
                existing.last_transition_time = Some(Utc::now());
            }
            existing.reason = reason;
            existing.message = message;
        }
        None => conditions.push(Condition {
            type_: type_.to_owned(),
            status,
            reason,
            message,
            last_transition_time: Some(Utc::now()),
        }),
    }
}
