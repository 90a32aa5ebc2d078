//! Easel Core Library
//!
//! This crate provides shared configuration, identifiers and constants for Easel.

pub mod config;
pub mod error;
pub mod types;

pub use config::{TaskRetryConfig, WorkerConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::{
    CacheVersion, NotificationAction, NotificationPayload, ResourceKey, SAVE_IMAGE_TASK,
};
