use crate::error::{self, OpaqueError, Result};
use crate::ImageRegistrySpec;
use snafu::ensure;

impl ImageRegistrySpec {
    /// Check that the spec can be acted upon. A spec that fails here will fail again until a user
    /// changes it, so the caller should not retry.
    pub fn verify(&self) -> Result<()> {
        Ok(self.verify_inner()?)
    }

    fn verify_inner(&self) -> std::result::Result<(), OpaqueError> {
        ensure!(
            self.replicas >= 0,
            error::NegativeReplicasSnafu {
                replicas: self.replicas
            }
        );

        let count = self.storage.configured_backends();
        ensure!(count <= 1, error::MultipleStorageBackendsSnafu { count });

        if self.storage.empty_dir.is_some() {
            ensure!(
                self.replicas <= 1,
                error::SharedEmptyDirSnafu {
                    replicas: self.replicas
                }
            );
        }

        if let Some(pvc) = &self.storage.pvc {
            ensure!(
                !pvc.claim.is_empty(),
                error::MissingStorageFieldSnafu {
                    backend: "pvc",
                    field: "claim"
                }
            );
        }

        if let Some(s3) = &self.storage.s3 {
            ensure!(
                !s3.bucket.is_empty(),
                error::MissingStorageFieldSnafu {
                    backend: "s3",
                    field: "bucket"
                }
            );
            ensure!(
                !s3.region.is_empty(),
                error::MissingStorageFieldSnafu {
                    backend: "s3",
                    field: "region"
                }
            );
        }

        Ok(())
    }
}
