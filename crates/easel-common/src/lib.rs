//! Error type, logging setup and retry helpers shared by the Easel crates.

pub mod error;
pub mod logging;
pub mod retry;

pub use error::{EaselError, Result, ResultExt};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use retry::{retry_if, RetryConfig};
