//! Log subscriber setup driven by the `logging` settings section.
//!
//! With `logging.json` enabled each event is one JSON object per line:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00Z","level":"INFO","fields":{"message":"access rule created"}}
//! ```
//!
//! `RUST_LOG` overrides the configured level when set.

use std::str::FromStr;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Resolved logging options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    pub json: bool,
    pub level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    /// Levels are checked by `ServerConfig::validate`; anything unparsable
    /// here falls back to INFO.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            json: settings.json,
            level: Level::from_str(&settings.level).unwrap_or(Level::INFO),
        }
    }

    /// Filter for the configured level, ignoring `RUST_LOG`.
    pub fn level_filter(&self) -> EnvFilter {
        EnvFilter::new(self.level.as_str())
    }
}

/// Assembles the subscriber without installing it.
pub fn build_subscriber<W>(
    config: &LoggingConfig,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let format = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer().with_ansi(false).with_writer(writer).boxed()
    };

    tracing_subscriber::registry().with(format).with(filter)
}

/// Installs the global subscriber writing to stdout.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level_filter());
    let subscriber = build_subscriber(config, filter, std::io::stdout);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = SharedBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(config: LoggingConfig, emit: impl FnOnce()) -> String {
        let buffer = SharedBuffer::default();
        let subscriber = build_subscriber(&config, config.level_filter(), buffer.clone());
        tracing::subscriber::with_default(subscriber, emit);
        buffer.contents()
    }

    #[test]
    fn test_from_settings_reads_level_and_format() {
        let config = LoggingConfig::from_settings(&LoggingSettings {
            level: "warn".to_string(),
            json: true,
        });
        assert_eq!(
            config,
            LoggingConfig {
                json: true,
                level: Level::WARN
            }
        );

        let fallback = LoggingConfig::from_settings(&LoggingSettings {
            level: "loud".to_string(),
            json: false,
        });
        assert_eq!(fallback, LoggingConfig::default());
    }

    #[test]
    fn test_json_output_has_one_object_per_event() {
        let config = LoggingConfig {
            json: true,
            level: Level::INFO,
        };
        let output = capture(config, || {
            tracing::info!(rule_id = "r1", "access rule created");
        });

        let line = output.lines().next().expect("one log line");
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["fields"]["message"], "access rule created");
        assert_eq!(parsed["fields"]["rule_id"], "r1");
    }

    #[test]
    fn test_text_output_respects_configured_level() {
        let settings = LoggingSettings {
            level: "info".to_string(),
            json: false,
        };
        let output = capture(LoggingConfig::from_settings(&settings), || {
            tracing::debug!("rule cache refreshed");
            tracing::info!("access rule deleted");
        });

        assert!(output.contains("access rule deleted"));
        assert!(!output.contains("rule cache refreshed"));
        assert!(serde_json::from_str::<serde_json::Value>(output.trim()).is_err());
    }

    #[test]
    fn test_debug_level_lets_debug_events_through() {
        let config = LoggingConfig {
            json: false,
            level: Level::DEBUG,
        };
        let output = capture(config, || tracing::debug!("rule cache refreshed"));
        assert!(output.contains("rule cache refreshed"));
    }
}
