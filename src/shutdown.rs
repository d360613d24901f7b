//! Graceful shutdown on OS interrupt
//!
//! A thin wrapper around the file lifecycle's close path: on Ctrl+C every
//! async queue is closed, its worker drains what was already enqueued, and
//! every open log file is closed — in that order, so a worker never writes
//! to a closed handle.

use colored::Colorize;
use std::sync::Arc;

use crate::core::Logger;
use crate::error::{LogError, LogResult};

/// Install a Ctrl+C handler that shuts the logger down and exits.
///
/// Installing a handler replaces the default interrupt behavior, so the
/// process exits here once the shutdown sequence has finished. Call at most
/// once per process.
pub fn install_shutdown_handler(logger: Arc<Logger>) -> LogResult<()> {
    ctrlc::set_handler(move || {
        eprintln!(
            "{}",
            "🛑 [LOGGER] Interrupt received, draining queues and closing log files...".yellow()
        );
        logger.shutdown();
        std::process::exit(0);
    })
    .map_err(|e| LogError::Config(format!("failed to install interrupt handler: {}", e)))
}
