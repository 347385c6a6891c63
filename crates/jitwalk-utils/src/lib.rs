//! # jitwalk Utilities
//!
//! Shared utilities for the jitwalk workspace: logging built on `tracing`.

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
