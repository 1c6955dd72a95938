/*!

The reconciliation engine of the image registry operator. Changes to any watched object are
funneled into a single trigger on a deduplicating, rate-limited work queue, and a single processor
recomputes the whole desired state of the registry on every trigger.

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
// The lints above are for production code.
#![cfg_attr(
    test,
    allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)
)]

pub mod clients;
pub mod config;
pub mod constants;
mod diff;
pub mod error;
pub mod funnel;
pub mod generator;
pub mod informer;
pub mod operator;
pub mod queue;
pub mod reconcile;

pub use config::OperatorConfig;
pub use error::{Error, Result};
pub use reconcile::Controller;
