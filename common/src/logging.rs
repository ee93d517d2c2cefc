//! Structured logging initialization
//!
//! Provides consistent logging initialization for pipeline step binaries.

use crate::config::ConfigExt;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Guard that keeps the tracing subscriber active.
/// Drop this at the end of main to flush logs.
pub struct LogGuard;

/// Default level for a step. The runner sets `RUNNER_DEBUG=1` when step
/// debug logging is enabled for a re-run.
fn default_level() -> Level {
    if String::env_or("RUNNER_DEBUG", "0") == "1" {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Initialize structured logging for a component.
///
/// Returns a guard that should be held for the lifetime of the program.
///
/// # Example
/// ```ignore
/// let _guard = init_logging("mysql-deploy");
/// info!("Starting up...");
/// ```
pub fn init_logging(component: &str) -> LogGuard {
    let filter = EnvFilter::from_default_env().add_directive(default_level().into());

    let format = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    tracing::debug!(component, "Logging initialized");

    LogGuard
}
