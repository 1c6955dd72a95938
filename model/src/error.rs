use snafu::Snafu;

/// The public error type returned by the model.
#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("replicas must be greater than or equal to 0, got {}", replicas))]
    NegativeReplicas { replicas: i32 },

    #[snafu(display(
        "at most one storage backend may be configured, found {} backends",
        count
    ))]
    MultipleStorageBackends { count: usize },

    #[snafu(display(
        "emptyDir storage cannot be shared between {} replicas, use a single replica or a \
         persistent backend",
        replicas
    ))]
    SharedEmptyDir { replicas: i32 },

    #[snafu(display("storage backend '{}' is missing the required field '{}'", backend, field))]
    MissingStorageField { backend: String, field: String },
}
