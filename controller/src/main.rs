/*!

This [operator] runs in a Kubernetes cluster and keeps an image registry deployed according to the
cluster's `ImageRegistry` object, creating a default one if none exists.

[operator]: https://kubernetes.io/docs/concepts/extend-kubernetes/operator/

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

use controller::operator::run;
use controller::OperatorConfig;
use env_logger::Builder;
use kube::Client;
use log::{error, info, LevelFilter};

#[tokio::main]
async fn main() {
    init_logger();
    info!("Starting");

    let config = match OperatorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize the k8s client from in-cluster variables or KUBECONFIG.
    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to create k8s client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(client, config, shutdown_signal()).await {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Stopped");
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for SIGINT: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// The log level used when the `RUST_LOG` environment variable does not exist.
const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Extract the value of `RUST_LOG` if it exists, otherwise log this workspace's crates at
/// `DEFAULT_LEVEL_FILTER`.
fn init_logger() {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for our crates only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), DEFAULT_LEVEL_FILTER)
                .filter(Some("controller"), DEFAULT_LEVEL_FILTER)
                .filter(Some("registry_operator_model"), DEFAULT_LEVEL_FILTER)
                .init();
        }
    }
}
