//! Worker configuration

use easel_common::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{CacheVersion, NotificationPayload, SAVE_IMAGE_TASK};

/// Offline worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the application is served from; manifest paths resolve against it
    pub origin: Url,

    /// Current cache generation. Bump on every release that changes cached assets
    pub cache_version: CacheVersion,

    /// Resources pre-populated at install time, in order
    pub asset_manifest: Vec<String>,

    /// Tag of the deferred save task
    pub sync_task_name: String,

    /// Latency of the stand-in save step, in milliseconds
    pub task_latency_ms: u64,

    /// Upper bound on cached body bytes across all versions (None = unbounded)
    pub storage_quota_bytes: Option<u64>,

    /// Notification shown when the deferred save completes
    pub notification: NotificationPayload,

    /// Retry policy for the deferred save task
    pub task_retry: TaskRetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Delay cap, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor between delays
    pub backoff_multiplier: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_version: CacheVersion::new("paint-app-cache-v2"),
            asset_manifest: vec![
                "/index.html".to_string(),
                "/assets/script.js".to_string(),
                "/manifest.json".to_string(),
                "/assets/styles.css".to_string(),
                "/icons".to_string(),
            ],
            sync_task_name: SAVE_IMAGE_TASK.to_string(),
            task_latency_ms: 3000,
            storage_quota_bytes: None,
            notification: NotificationPayload::image_saved(),
            task_retry: TaskRetryConfig::default(),
        }
    }
}

impl Default for TaskRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&TaskRetryConfig> for RetryConfig {
    fn from(config: &TaskRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: true,
        }
    }
}

fn default_origin() -> Url {
    Url::parse("http://localhost:8080/").expect("static origin is a valid URL")
}

impl WorkerConfig {
    /// Default location of the config file (`<config dir>/easel/worker.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("easel")
            .join("worker.json")
    }

    /// Load configuration from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), version = %config.cache_version, "Loaded worker config");
        Ok(config)
    }

    /// Write configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_version.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("cache_version must not be empty".into()));
        }
        if self.sync_task_name.trim().is_empty() {
            return Err(ConfigError::Invalid("sync_task_name must not be empty".into()));
        }
        for path in &self.asset_manifest {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "manifest entry {path:?} must be an absolute path"
                )));
            }
        }
        if self.task_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("task_retry.max_attempts must be at least 1".into()));
        }
        if self.task_retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "task_retry.backoff_multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve an application path (e.g. `/index.html`) against the origin.
    pub fn resolve(&self, path: &str) -> ConfigResult<Url> {
        Ok(self.origin.join(path)?)
    }

    /// Manifest entries resolved against the origin, in manifest order.
    pub fn manifest_urls(&self) -> ConfigResult<Vec<Url>> {
        self.asset_manifest.iter().map(|p| self.resolve(p)).collect()
    }

    pub fn task_latency(&self) -> Duration {
        Duration::from_millis(self.task_latency_ms)
    }

    pub fn retry_policy(&self) -> RetryConfig {
        RetryConfig::from(&self.task_retry)
    }
}
