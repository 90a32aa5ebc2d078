//! `tracing` subscriber setup for the `easel` binary.

use std::str::FromStr;

use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Source locations, thread names and span enter/close events.
    pub detailed: bool,
    /// Directive string such as `easel_sw=debug,reqwest=warn`. Overrides
    /// both `level` and `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_verbosity(0)
    }
}

impl LogConfig {
    /// `0` is info, `1` debug, anything higher trace. Debug and trace
    /// turn on detailed output.
    pub fn for_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            format: LogFormat::Pretty,
            detailed: verbosity > 0,
            filter: None,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Explicit filter first, then `RUST_LOG`, then `level`. An unparsable
    /// directive falls back to `level`.
    fn env_filter(&self) -> EnvFilter {
        let parsed = match &self.filter {
            Some(directives) => EnvFilter::try_new(directives).map_err(|_| ()),
            None => EnvFilter::try_from_default_env().map_err(|_| ()),
        };
        parsed.unwrap_or_else(|_| {
            EnvFilter::default().add_directive(LevelFilter::from_level(self.level).into())
        })
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: LogConfig) -> Result<(), TryInitError> {
    let spans = if config.detailed {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_file(config.detailed)
            .with_line_number(config.detailed)
            .with_thread_names(config.detailed)
            .with_span_events(spans)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_span_events(spans).boxed(),
        LogFormat::Json => fmt::layer().json().with_span_events(spans).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(config.env_filter())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiet_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.detailed);
    }

    #[test]
    fn test_for_verbosity() {
        assert_eq!(LogConfig::for_verbosity(1).level, Level::DEBUG);
        assert!(LogConfig::for_verbosity(1).detailed);
        assert_eq!(LogConfig::for_verbosity(5).level, Level::TRACE);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = LogConfig::default().with_filter("easel_sw=trace");
        assert_eq!(config.env_filter().max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_bad_filter_falls_back_to_level() {
        let config = LogConfig::for_verbosity(1).with_filter("easel_sw=loud");
        assert_eq!(config.env_filter().max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_logging(LogConfig::default());
        assert!(init_logging(LogConfig::default()).is_err());
    }
}
