use kube::error::ErrorResponse;
use snafu::Snafu;

/// The result type returned by [`RegistryStore`] implementations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The result type returned by [`Listers`] implementations.
pub type ListerResult<T> = std::result::Result<T, ListerError>;

/// The error type returned by [`RegistryStore`] implementations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum StoreError {
    #[snafu(display("'{}' already exists: {}", name, source))]
    AlreadyExists { name: String, source: kube::Error },

    #[snafu(display("Unable to {} '{}', it was modified concurrently: {}", method, name, source))]
    Conflict {
        method: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to {} '{}', it does not exist: {}", method, name, source))]
    NotFound {
        method: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to {} '{}': {}", method, name, source))]
    Request {
        method: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to serialize '{}': {}", name, source))]
    Serialize {
        name: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Classify an error returned by the Kubernetes API. A 409 means `AlreadyExists` when the API
    /// server says so (creation) and a version `Conflict` otherwise.
    pub fn from_kube<S1, S2>(method: S1, name: S2, e: kube::Error) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let method = method.into();
        let name = name.into();
        let (code, already_exists) = match &e {
            kube::Error::Api(ErrorResponse { code, reason, .. }) => {
                (Some(*code), reason == "AlreadyExists")
            }
            _ => (None, false),
        };
        match (code, already_exists) {
            (Some(409), true) => StoreError::AlreadyExists { name, source: e },
            (Some(409), false) => StoreError::Conflict {
                method,
                name,
                source: e,
            },
            (Some(404), _) => StoreError::NotFound {
                method,
                name,
                source: e,
            },
            _ => StoreError::Request {
                method,
                name,
                source: e,
            },
        }
    }

    /// The write carried a stale version token. This is expected when more than one writer is
    /// active and is resolved by reading again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// The error type returned by [`Listers`] implementations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum ListerError {
    #[snafu(display("The {} cache has not completed its initial list", kind))]
    NotSynced { kind: String },
}
