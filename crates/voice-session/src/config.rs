//! Voice session configuration
//!
//! Configuration is read once when a session is built and is not reloaded afterwards.
//!
//! ```rust
//! use std::time::Duration;
//! use loro_voice_session::VoiceConfig;
//!
//! let config = VoiceConfig::new()
//!     .with_api_key("pk_test")
//!     .with_assistant_id("assistant-1")
//!     .with_max_call_duration(Duration::from_secs(120));
//!
//! assert_eq!(config.warning_threshold, Duration::from_secs(60));
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::countdown::saturating_millis;
use crate::retry::RetryPolicy;

pub const ENV_API_KEY: &str = "LORO_VOICE_API_KEY";
pub const ENV_ASSISTANT_ID: &str = "LORO_VOICE_ASSISTANT_ID";
pub const ENV_MAX_CALL_DURATION_MINUTES: &str = "LORO_MAX_CALL_DURATION_MINUTES";
pub const ENV_CALL_WARNING_SECONDS: &str = "LORO_CALL_WARNING_SECONDS";
pub const ENV_MAX_RETRIES: &str = "LORO_VOICE_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "LORO_VOICE_RETRY_DELAY_MS";

pub const DEFAULT_MAX_CALL_DURATION_MINUTES: f64 = 5.0;
pub const DEFAULT_CALL_WARNING_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Key used to construct the SDK client
    pub api_key: Option<String>,
    /// Assistant the call is placed with
    pub assistant_id: Option<String>,
    /// Hard ceiling on call length
    pub max_call_duration: Duration,
    /// Warn when this much time is left
    pub warning_threshold: Duration,
    pub retry: RetryPolicy,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant_id: None,
            max_call_duration: Duration::from_secs_f64(DEFAULT_MAX_CALL_DURATION_MINUTES * 60.0),
            warning_threshold: Duration::from_secs_f64(DEFAULT_CALL_WARNING_SECONDS),
            retry: RetryPolicy::default(),
        }
    }
}

impl VoiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values count as absent. Values that do not parse, or are not positive, fall back to
    /// the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        let max_call_duration = parse_duration_or(
            ENV_MAX_CALL_DURATION_MINUTES,
            get(ENV_MAX_CALL_DURATION_MINUTES),
            60.0,
            defaults.max_call_duration,
        );
        let warning_threshold = parse_duration_or(
            ENV_CALL_WARNING_SECONDS,
            get(ENV_CALL_WARNING_SECONDS),
            1.0,
            defaults.warning_threshold,
        );
        let max_retries = parse_or(
            ENV_MAX_RETRIES,
            get(ENV_MAX_RETRIES),
            defaults.retry.max_retries,
            |_| true,
        );
        let retry_delay_ms = parse_or(
            ENV_RETRY_DELAY_MS,
            get(ENV_RETRY_DELAY_MS),
            saturating_millis(defaults.retry.retry_delay),
            |_| true,
        );

        Self {
            api_key: get(ENV_API_KEY),
            assistant_id: get(ENV_ASSISTANT_ID),
            max_call_duration,
            warning_threshold,
            retry: RetryPolicy::new(max_retries, Duration::from_millis(retry_delay_ms)),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_assistant_id(mut self, assistant_id: impl Into<String>) -> Self {
        self.assistant_id = Some(assistant_id.into());
        self
    }

    pub fn with_max_call_duration(mut self, duration: Duration) -> Self {
        self.max_call_duration = duration;
        self
    }

    pub fn with_warning_threshold(mut self, threshold: Duration) -> Self {
        self.warning_threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Positive, representable duration measured in `unit_secs`, or `default` with a warning
fn parse_duration_or(
    key: &str,
    raw: Option<String>,
    unit_secs: f64,
    default: Duration,
) -> Duration {
    let Some(raw) = raw else {
        return default;
    };
    let parsed = raw
        .parse::<f64>()
        .ok()
        .filter(|value| *value > 0.0)
        .and_then(|value| Duration::try_from_secs_f64(value * unit_secs).ok())
        .filter(|duration| !duration.is_zero());
    match parsed {
        Some(duration) => duration,
        None => {
            warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }
    }
}

fn parse_or<T, V>(key: &str, raw: Option<String>, default: T, valid: V) -> T
where
    T: FromStr + Copy,
    V: Fn(&T) -> bool,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }
    }
}
