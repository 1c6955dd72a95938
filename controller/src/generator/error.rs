use kube::error::ErrorResponse;
use snafu::Snafu;

pub type GeneratorResult<T> = std::result::Result<T, GeneratorError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum GeneratorError {
    #[snafu(display("storage backend is not configured"))]
    StorageNotConfigured,

    #[snafu(display("Unable to {} {} '{}': {}", action, kind, name, source))]
    KubeApi {
        action: &'static str,
        kind: &'static str,
        name: String,
        source: kube::Error,
    },
}

impl GeneratorError {
    pub fn is_storage_not_configured(&self) -> bool {
        matches!(self, GeneratorError::StorageNotConfigured)
    }

    pub(super) fn is_not_found(&self) -> bool {
        match self {
            GeneratorError::KubeApi {
                source: kube::Error::Api(ErrorResponse { code: 404, .. }),
                ..
            } => true,
            GeneratorError::KubeApi { .. } | GeneratorError::StorageNotConfigured => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kube_api(code: u16, reason: &str) -> GeneratorError {
        GeneratorError::KubeApi {
            action: "delete",
            kind: "Deployment",
            name: "image-registry".to_string(),
            source: kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} error", reason),
                reason: reason.to_string(),
                code,
            }),
        }
    }

    #[test]
    fn not_found_is_only_a_404() {
        assert!(kube_api(404, "NotFound").is_not_found());
        assert!(!kube_api(409, "Conflict").is_not_found());
        assert!(!kube_api(500, "InternalError").is_not_found());
        assert!(!GeneratorError::StorageNotConfigured.is_not_found());
        assert!(GeneratorError::StorageNotConfigured.is_storage_not_configured());
    }
}
