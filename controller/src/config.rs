use crate::constants::{DEFAULT_REGISTRY_IMAGE, DEFAULT_RESYNC_PERIOD};
use crate::queue::RateLimiterSettings;
use model::constants::DEFAULT_OPERATOR_NAMESPACE;
use model::{ImageRegistrySpec, RegistryStorage};
use serde::Deserialize;
use snafu::{ensure, ResultExt, Snafu};
use std::time::Duration;

/// The prefix of every environment variable the operator reads its configuration from.
pub const ENV_PREFIX: &str = "REGOP_";

const EMPTY_DIR: &str = "emptyDir";

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Unable to parse {}* environment variables: {}", prefix, source))]
    Parse {
        prefix: &'static str,
        source: envy::Error,
    },

    #[snafu(display(
        "Unsupported bootstrap storage '{}', the only supported value is '{}'",
        value,
        EMPTY_DIR
    ))]
    BootstrapStorage { value: String },

    #[snafu(display("{}{} must be greater than zero", prefix, name))]
    Zero {
        prefix: &'static str,
        name: &'static str,
    },
}

/// Operator settings, read from `REGOP_`-prefixed environment variables.
///
/// # Example
///
/// ```text
/// REGOP_NAMESPACE=registry
/// REGOP_RESYNC_PERIOD_SECS=300
/// REGOP_BOOTSTRAP_STORAGE=emptyDir
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperatorConfig {
    /// The namespace that holds the registry deployment and other dependent objects.
    #[serde(default = "namespace")]
    pub namespace: String,
    /// How often the informers replay their caches.
    #[serde(default = "resync_period_secs")]
    pub resync_period_secs: u64,
    #[serde(default = "base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "qps")]
    pub qps: f64,
    #[serde(default = "burst")]
    pub burst: u32,
    /// The registry container image.
    #[serde(default = "registry_image")]
    pub registry_image: String,
    /// The storage of a bootstrapped `ImageRegistry`. Unset means no storage, which the registry
    /// reports as `StorageNotConfigured` until an administrator picks a backend.
    #[serde(default)]
    pub bootstrap_storage: Option<String>,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed(ENV_PREFIX)
            .from_env::<Self>()
            .context(ParseSnafu { prefix: ENV_PREFIX })?
            .validated()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Self>(vars)
            .context(ParseSnafu { prefix: ENV_PREFIX })?
            .validated()
    }

    /// Reject durations that cannot be used as a tick period or a backoff cap.
    fn validated(self) -> Result<Self, ConfigError> {
        ensure!(
            self.resync_period_secs > 0,
            ZeroSnafu {
                prefix: ENV_PREFIX,
                name: "RESYNC_PERIOD_SECS"
            }
        );
        ensure!(
            self.max_delay_secs > 0,
            ZeroSnafu {
                prefix: ENV_PREFIX,
                name: "MAX_DELAY_SECS"
            }
        );
        Ok(self)
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    pub fn rate_limiter_settings(&self) -> RateLimiterSettings {
        RateLimiterSettings {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            qps: self.qps,
            burst: self.burst,
        }
    }

    /// The spec of an `ImageRegistry` created by the operator.
    pub fn bootstrap_spec(&self) -> Result<ImageRegistrySpec, ConfigError> {
        let storage = match self.bootstrap_storage.as_deref() {
            None | Some("") => RegistryStorage::default(),
            Some(EMPTY_DIR) => RegistryStorage::empty_dir(),
            Some(value) => return BootstrapStorageSnafu { value }.fail(),
        };
        Ok(ImageRegistrySpec {
            storage,
            ..ImageRegistrySpec::default()
        })
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: namespace(),
            resync_period_secs: resync_period_secs(),
            base_delay_ms: base_delay_ms(),
            max_delay_secs: max_delay_secs(),
            qps: qps(),
            burst: burst(),
            registry_image: registry_image(),
            bootstrap_storage: None,
        }
    }
}

fn namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_owned()
}

fn resync_period_secs() -> u64 {
    DEFAULT_RESYNC_PERIOD.as_secs()
}

fn base_delay_ms() -> u64 {
    5
}

fn max_delay_secs() -> u64 {
    1000
}

fn qps() -> f64 {
    10.0
}

fn burst() -> u32 {
    100
}

fn registry_image() -> String {
    DEFAULT_REGISTRY_IMAGE.to_owned()
}
