use std::time::Duration;

/// The only key that is ever put on the work queue. It carries no information; every
/// reconciliation recomputes everything from the cache.
pub const WORKQUEUE_KEY: &str = "changes";

/// The name of the work queue, used in log messages.
pub const WORKQUEUE_NAME: &str = "Changes";

/// How often the informers replay their caches as update notifications.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10 * 60);

/// How long an informer waits before polling its watch stream again after an error.
pub const WATCH_ERROR_DELAY: Duration = Duration::from_secs(1);

/// The field manager name used for server-side apply.
pub const FIELD_MANAGER: &str = "registry-operator";

/// The port the registry listens on.
pub const REGISTRY_PORT: i32 = 5000;

pub const DEFAULT_REGISTRY_IMAGE: &str = "docker.io/library/registry:2";
