//! Core infrastructure module for stateful metrics.
//!
//! - [`types`]: input containers, outputs and configuration enumerations
//! - [`constants`]: defaults shared by the metrics
//! - [`error`]: the crate error type
//! - [`network`]: collective communication used to synchronize metric state

pub mod constants;
pub mod error;
pub mod network;
pub mod types;

pub use constants::*;
pub use error::{MetricsError, Result};
pub use network::{Collective, LocalCollective, ThreadCollective};
pub use types::*;

use std::sync::Once;

static CORE_INIT: Once = Once::new();

/// Initialize logging for the library.
///
/// Safe to call more than once; only the first call has an effect, and an
/// already-installed logger is left in place.
pub fn initialize_core() -> Result<()> {
    CORE_INIT.call_once(|| {
        // Ignore the error: the host application may own the logger.
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
        log::debug!("stateful-metrics {} initialized", STATEFUL_METRICS_VERSION);
    });
    Ok(())
}

/// Whether [`initialize_core`] has run.
pub fn is_core_initialized() -> bool {
    CORE_INIT.is_completed()
}
