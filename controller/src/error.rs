use crate::clients::{ListerError, StoreError};
use crate::generator::GeneratorError;
use crate::reconcile::ApplyError;
use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can make a reconciliation pass fail. Every variant is retried; failures that
/// retrying cannot fix are recorded in the registry status instead of surfacing here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unable to apply ImageRegistry '{}': {}", name, source))]
    Apply { name: String, source: ApplyError },

    #[snafu(display("Unable to create default ImageRegistry: {}", source))]
    Bootstrap { source: StoreError },

    #[snafu(display("Unable to finalize ImageRegistry '{}': {}", name, source))]
    Finalize {
        name: String,
        source: GeneratorError,
    },

    #[snafu(display("Unable to get Deployment '{}' from the cache: {}", name, source))]
    GetDeployment { name: String, source: ListerError },

    #[snafu(display("Unable to get ImageRegistry '{}' from the cache: {}", name, source))]
    GetRegistry { name: String, source: ListerError },

    #[snafu(display(
        "Teardown of ImageRegistry '{}' is not complete, keeping finalizer '{}'",
        name,
        finalizer
    ))]
    TeardownPending { name: String, finalizer: String },

    #[snafu(display("Unable to update ImageRegistry '{}': {}", name, source))]
    UpdateRegistry { name: String, source: StoreError },

    #[snafu(display("Unable to update status of ImageRegistry '{}': {}", name, source))]
    UpdateStatus { name: String, source: StoreError },
}

impl Error {
    /// A write was rejected because the object changed since it was read. Expected whenever
    /// someone else writes the registry at the same time, so it is not worth an error log.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::UpdateRegistry { source, .. } | Error::UpdateStatus { source, .. } => {
                source.is_conflict()
            }
            _ => false,
        }
    }
}
