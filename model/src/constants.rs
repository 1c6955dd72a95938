/// Helper macro to avoid retyping the base domain-like name of the operator when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name.
/// When given a string literal parameter it adds `/parameter` to the end.
macro_rules! regop {
    () => {
        "registry.operator.dev"
    };
    ($s:literal) => {
        concat!(regop!(), "/", $s)
    };
}

// System identifiers
pub const API_GROUP: &str = regop!();
pub const API_VERSION: &str = regop!("v1");
pub const CONFIG_API_GROUP: &str = "config.operator.dev";

// Object names
/// The name of the singleton `ImageRegistry` object.
pub const REGISTRY_RESOURCE_NAME: &str = "cluster";
/// The name of the registry deployment and service in the operator namespace.
pub const REGISTRY_NAME: &str = "image-registry";
/// The name of the `ClusterOperator` that mirrors the operator's status.
pub const CLUSTER_OPERATOR_NAME: &str = "image-registry";
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "image-registry";

// Namespaces the operator reads from but does not own
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";
pub const OPENSHIFT_CONFIG_NAMESPACE: &str = "openshift-config";
/// The installer configuration, the only object in `kube-system` the operator cares about.
pub const INSTALLER_CONFIG_NAME: &str = "cluster-config-v1";

// Finalizers
pub const FINALIZER_REGISTRY: &str = regop!("registry");

// Standard tags https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
pub const APP_NAME: &str = "app.kubernetes.io/name";
pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

#[test]
fn regop_constants_macro_test() {
    assert_eq!("registry.operator.dev", regop!());
    assert_eq!("registry.operator.dev/v1", API_VERSION);
    assert_eq!("registry.operator.dev/registry", FINALIZER_REGISTRY);
}
