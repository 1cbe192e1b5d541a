pub mod error;
pub mod logging;

pub use error::{ErrorCategory, ReviewError};
pub use logging::{setup_logging, LogFormat, LogOutput, LoggingConfig, ReviewTracker};
