//! Logging setup for applications embedding voice sessions

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{VoiceError, VoiceResult};

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Include file and line of each event
    pub source_location: bool,
    /// Logged once the subscriber is installed
    pub app_name: String,
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: LogFormat::default(),
            source_location: false,
            app_name: "loro-voice".to_string(),
        }
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr. `RUST_LOG` directives are honoured on top of the configured level.
/// Installing twice is an error.
pub fn setup_logging(config: &LoggingConfig) -> VoiceResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| VoiceError::config(format!("failed to install logger: {}", e)))?;

    tracing::info!("Starting {} v{}", config.app_name, crate::VERSION);
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> VoiceResult<Level> {
    Level::from_str(level).map_err(|_| VoiceError::config(format!("Invalid log level: {}", level)))
}
