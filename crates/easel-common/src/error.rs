//! The error every Easel layer eventually converts into.

use thiserror::Error;

type Source = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum EaselError {
    /// Cache storage unavailable or over quota.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// A background sync task failed; the run may be retried.
    #[error("Task error: {message}")]
    Task {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// Drawing surface or PNG export failure.
    #[error("Canvas error: {message}")]
    Canvas {
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl EaselError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
            source: None,
        }
    }

    pub fn canvas(message: impl Into<String>) -> Self {
        Self::Canvas {
            message: message.into(),
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause. Variants without a source slot are
    /// returned unchanged.
    pub fn with_source(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            Self::Storage { source, .. }
            | Self::Network { source, .. }
            | Self::Task { source, .. }
            | Self::Canvas { source, .. }
            | Self::Config { source, .. } => *source = Some(Box::new(cause)),
            Self::Io(_) | Self::NotFound(_) => {}
        }
        self
    }

    /// Whether a sync task failing with this error should run again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Task { .. } | Self::Io(_)
        )
    }

    /// Short name used as a log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage",
            Self::Network { .. } => "network",
            Self::Task { .. } => "task",
            Self::Canvas { .. } => "canvas",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::NotFound(_) => "not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, EaselError>;

pub trait ResultExt<T> {
    /// Turn any error into a retryable [`EaselError::Task`] carrying `message`.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| EaselError::task(message).with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_categories() {
        assert_eq!(EaselError::storage("quota").category(), "storage");
        assert_eq!(EaselError::network("offline").category(), "network");
        assert_eq!(EaselError::task("save").category(), "task");
        assert_eq!(EaselError::NotFound("x".into()).category(), "not_found");
    }

    #[test]
    fn test_retryable() {
        assert!(EaselError::network("offline").is_retryable());
        assert!(EaselError::task("write failed").is_retryable());
        assert!(!EaselError::storage("quota").is_retryable());
        assert!(!EaselError::config("bad json").is_retryable());
        assert!(!EaselError::NotFound("stash".into()).is_retryable());
    }

    #[test]
    fn test_context_keeps_cause() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        let err = failed.context("writing canvas_image.png").unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Task error: writing canvas_image.png");
        assert_eq!(err.source().unwrap().to_string(), "read-only");
    }

    #[test]
    fn test_with_source_ignores_sourceless_variants() {
        let err = EaselError::NotFound("stash".into()).with_source(std::fmt::Error);
        assert!(err.source().is_none());
    }
}
