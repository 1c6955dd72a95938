use crate::generator::GeneratorError;
use snafu::Snafu;
use std::fmt::{Display, Formatter};

/// Why the registry cannot be reconciled until someone changes its spec.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PermanentReason {
    VerificationFailed,
    StorageNotConfigured,
}

impl PermanentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermanentReason::VerificationFailed => "VerificationFailed",
            PermanentReason::StorageNotConfigured => "StorageNotConfigured",
        }
    }
}

impl Display for PermanentReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of applying the management state.
pub type ApplyResult = std::result::Result<(), ApplyError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum ApplyError {
    /// Retrying will not help. Recorded in the status and not requeued.
    #[snafu(display("{}: {}", reason, message))]
    Permanent {
        reason: PermanentReason,
        message: String,
    },

    /// Worth retrying with backoff.
    #[snafu(display("{}", source))]
    Transient { source: GeneratorError },
}

impl ApplyError {
    pub fn permanent_reason(&self) -> Option<PermanentReason> {
        match self {
            ApplyError::Permanent { reason, .. } => Some(*reason),
            ApplyError::Transient { .. } => None,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent_reason().is_some()
    }
}

impl From<GeneratorError> for ApplyError {
    fn from(e: GeneratorError) -> Self {
        if e.is_storage_not_configured() {
            ApplyError::Permanent {
                reason: PermanentReason::StorageNotConfigured,
                message: e.to_string(),
            }
        } else {
            ApplyError::Transient { source: e }
        }
    }
}

impl From<model::Error> for ApplyError {
    fn from(e: model::Error) -> Self {
        ApplyError::Permanent {
            reason: PermanentReason::VerificationFailed,
            message: e.to_string(),
        }
    }
}
