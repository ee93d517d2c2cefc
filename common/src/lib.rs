//! Shared utilities for pipeline step binaries
//!
//! This crate provides common functionality used by the deploy step:
//! - Structured logging initialization
//! - Environment variable and step input helpers
//! - Command execution utilities
//! - Workflow commands for reporting to the CI runner

pub mod command;
pub mod config;
pub mod logging;
pub mod workflow;

pub use command::{run, run_checked, CommandOutput};
pub use config::{ActionEnv, ConfigExt};
pub use logging::init_logging;
pub use workflow::{add_mask, set_failed};
