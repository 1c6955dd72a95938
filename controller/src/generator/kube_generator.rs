use super::error::{self, GeneratorResult};
use super::{ResourceGenerator, Teardown};
use crate::constants::{FIELD_MANAGER, REGISTRY_PORT};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, Patch, PatchParams, PropagationPolicy};
use kube::Api;
use log::{debug, info};
use model::constants::{APP_MANAGED_BY, APP_NAME, REGISTRY_NAME};
use model::{ImageRegistry, RegistryStorage};
use serde::de::DeserializeOwned;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::fmt::Debug;

const STORAGE_VOLUME: &str = "registry-storage";
const STORAGE_PATH: &str = "/var/lib/registry";

/// Runs the registry as a `Deployment` with a `Service` in front of it, both in the operator
/// namespace and both owned through server-side apply.
#[derive(Clone)]
pub struct KubeGenerator {
    client: kube::Client,
    namespace: String,
    image: String,
}

impl KubeGenerator {
    pub fn new<S1, S2>(client: kube::Client, namespace: S1, image: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            client,
            namespace: namespace.into(),
            image: image.into(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait::async_trait]
impl ResourceGenerator for KubeGenerator {
    async fn apply(&self, registry: &ImageRegistry) -> GeneratorResult<()> {
        let deployment = registry_deployment(registry, &self.namespace, &self.image)?;
        let service = registry_service(&self.namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();

        self.deployments()
            .patch(REGISTRY_NAME, &params, &Patch::Apply(&deployment))
            .await
            .context(error::KubeApiSnafu {
                action: "apply",
                kind: "Deployment",
                name: REGISTRY_NAME,
            })?;
        self.services()
            .patch(REGISTRY_NAME, &params, &Patch::Apply(&service))
            .await
            .context(error::KubeApiSnafu {
                action: "apply",
                kind: "Service",
                name: REGISTRY_NAME,
            })?;
        debug!("applied registry deployment and service in '{}'", self.namespace);
        Ok(())
    }

    async fn remove(&self, _: &ImageRegistry) -> GeneratorResult<()> {
        delete_if_exists(self.deployments(), "Deployment").await?;
        delete_if_exists(self.services(), "Service").await
    }

    async fn finalize(&self, registry: &ImageRegistry) -> GeneratorResult<Teardown> {
        self.remove(registry).await?;
        let remaining = self
            .deployments()
            .get_opt(REGISTRY_NAME)
            .await
            .context(error::KubeApiSnafu {
                action: "get",
                kind: "Deployment",
                name: REGISTRY_NAME,
            })?;
        if remaining.is_some() {
            info!("waiting for the registry deployment to be deleted");
            return Ok(Teardown::Pending);
        }
        Ok(Teardown::Complete)
    }
}

async fn delete_if_exists<K>(api: Api<K>, kind: &'static str) -> GeneratorResult<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = DeleteParams {
        propagation_policy: Some(PropagationPolicy::Background),
        ..DeleteParams::default()
    };
    match api
        .delete(REGISTRY_NAME, &params)
        .await
        .context(error::KubeApiSnafu {
            action: "delete",
            kind,
            name: REGISTRY_NAME,
        }) {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Creates the labels that we will add to everything the generator owns.
fn labels() -> BTreeMap<String, String> {
    [(APP_NAME, REGISTRY_NAME), (APP_MANAGED_BY, FIELD_MANAGER)]
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn env_var<S1, S2>(name: S1, value: S2) -> EnvVar
where
    S1: Into<String>,
    S2: Into<String>,
{
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// The environment variables and volume that point the registry at its storage backend.
fn storage_config(storage: &RegistryStorage) -> (Vec<EnvVar>, Option<Volume>) {
    if let Some(s3) = &storage.s3 {
        return (
            vec![
                env_var("REGISTRY_STORAGE", "s3"),
                env_var("REGISTRY_STORAGE_S3_BUCKET", &s3.bucket),
                env_var("REGISTRY_STORAGE_S3_REGION", &s3.region),
            ],
            None,
        );
    }
    let volume = match &storage.pvc {
        Some(pvc) => Volume {
            name: STORAGE_VOLUME.to_owned(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc.claim.clone(),
                read_only: None,
            }),
            ..Volume::default()
        },
        None => Volume {
            name: STORAGE_VOLUME.to_owned(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
    };
    (
        vec![
            env_var("REGISTRY_STORAGE", "filesystem"),
            env_var("REGISTRY_STORAGE_FILESYSTEM_ROOTDIRECTORY", STORAGE_PATH),
        ],
        Some(volume),
    )
}

pub(crate) fn registry_deployment(
    registry: &ImageRegistry,
    namespace: &str,
    image: &str,
) -> GeneratorResult<Deployment> {
    let spec = &registry.spec;
    ensure!(spec.storage.is_configured(), error::StorageNotConfiguredSnafu);

    let (mut env, volume) = storage_config(&spec.storage);
    env.push(env_var(
        "REGISTRY_HTTP_ADDR",
        format!(":{}", REGISTRY_PORT),
    ));
    if let Some(level) = &spec.log_level {
        env.push(env_var("REGISTRY_LOG_LEVEL", level));
    }
    let volume_mounts = volume.as_ref().map(|volume| {
        vec![VolumeMount {
            name: volume.name.clone(),
            mount_path: STORAGE_PATH.to_owned(),
            ..VolumeMount::default()
        }]
    });
    let labels = labels();

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(REGISTRY_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: REGISTRY_NAME.to_owned(),
                        image: Some(image.to_owned()),
                        env: Some(env),
                        ports: Some(vec![ContainerPort {
                            container_port: REGISTRY_PORT,
                            ..ContainerPort::default()
                        }]),
                        volume_mounts,
                        ..Container::default()
                    }],
                    volumes: volume.map(|volume| vec![volume]),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

pub(crate) fn registry_service(namespace: &str) -> Service {
    let labels = labels();
    Service {
        metadata: ObjectMeta {
            name: Some(REGISTRY_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("registry".to_owned()),
                port: REGISTRY_PORT,
                target_port: Some(IntOrString::Int(REGISTRY_PORT)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
