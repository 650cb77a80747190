//! Logging setup for processes embedding cloudsync.
//!
//! The library itself only emits `tracing` events and never installs a
//! subscriber. A binary embedding it calls [`init_logging`] once at startup,
//! typically with the counts of its `-v` and `-q` flags.

use crate::Result;

/// Maps CLI-style verbosity flags to a tracing level.
///
/// quiet wins over any verbosity; otherwise 0=INFO, 1=DEBUG, 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Installs the global fmt subscriber for an embedding binary.
///
/// Call once, before the first synchronization pass; the level comes from
/// [`level_for`].
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use cloudsync_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::SyncError::configuration(format!("Failed to initialize logging: {}", e))
        })?;

    Ok(())
}
