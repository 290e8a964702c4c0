//! Error classification for voice SDK failures
//!
//! Raw SDK errors are never shown to users. Each one is matched against an ordered table of
//! patterns; the first match decides the [`ErrorType`], the message users see, and whether the
//! failure is worth retrying. Unmatched errors fall back to [`ErrorType::Unknown`].
//!
//! ```rust
//! use loro_voice_session::classify::{classify_message, ErrorType};
//!
//! let details = classify_message("Permission denied by user");
//! assert_eq!(details.error_type, ErrorType::Permission);
//! assert!(details.recoverable);
//! assert!(details.retryable);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::SdkError;
use crate::notify::{Notice, Notifier};

/// Delay between a permission error notice and the follow-up settings hint
pub const PERMISSION_HINT_DELAY: Duration = Duration::from_secs(1);

/// Hint shown after a microphone permission failure
pub const PERMISSION_HINT: &str =
    "To enable your microphone, open your browser settings, allow microphone access for this site, then try again.";

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Initialization,
    Connection,
    Authentication,
    Permission,
    Configuration,
    Server,
    Timeout,
    Network,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Connection => "connection",
            Self::Authentication => "authentication",
            Self::Permission => "permission",
            Self::Configuration => "configuration",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified view of an SDK error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub error_type: ErrorType,
    /// What the user is told
    pub user_message: String,
    /// What goes to the log, including the raw message
    pub log_message: String,
    /// The user can act (e.g. grant permission) and try again
    pub recoverable: bool,
    /// The automatic retry loop may try again on its own
    pub retryable: bool,
}

struct ErrorPattern {
    pattern: Regex,
    error_type: ErrorType,
    user_message: &'static str,
    log_message: &'static str,
    recoverable: bool,
    retryable: bool,
}

impl ErrorPattern {
    fn new(
        pattern: &str,
        error_type: ErrorType,
        user_message: &'static str,
        log_message: &'static str,
        recoverable: bool,
        retryable: bool,
    ) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            error_type,
            user_message,
            log_message,
            recoverable,
            retryable,
        }
    }
}

// Order matters: the first matching pattern wins.
static ERROR_PATTERNS: Lazy<Vec<ErrorPattern>> = Lazy::new(|| {
    vec![
        ErrorPattern::new(
            r"(?i)permission|notallowed|not allowed|microphone",
            ErrorType::Permission,
            "Microphone access was denied. Please allow microphone access to start a call.",
            "Microphone permission error",
            true,
            true,
        ),
        ErrorPattern::new(
            r"(?i)network|offline|fetch failed|connection (refused|reset)|econn",
            ErrorType::Network,
            "Network problem detected. Please check your internet connection.",
            "Network error",
            true,
            true,
        ),
        ErrorPattern::new(
            r"(?i)time(d)?[ -]?out|etimedout",
            ErrorType::Timeout,
            "The call took too long to connect. Please try again.",
            "Timeout error",
            true,
            true,
        ),
        ErrorPattern::new(
            r"(?i)assistant[ _-]?id|not configured|missing configuration|invalid assistant",
            ErrorType::Configuration,
            "The voice assistant is not configured correctly. Support has been notified.",
            "Configuration error",
            false,
            false,
        ),
        ErrorPattern::new(
            r"(?i)api[ _-]?key|unauthori[sz]ed|\b401\b|\b403\b|invalid (token|credential)|authentication",
            ErrorType::Authentication,
            "Unable to authenticate with the voice service. Support has been notified.",
            "Authentication error",
            false,
            false,
        ),
        ErrorPattern::new(
            r"(?i)initiali[sz]|not ready|failed to start|not loaded",
            ErrorType::Initialization,
            "The voice assistant failed to start. Please try again.",
            "Initialization error",
            true,
            true,
        ),
        ErrorPattern::new(
            r"(?i)connect|websocket|webrtc|\bice\b|disconnected",
            ErrorType::Connection,
            "Could not connect to the voice assistant. Please try again.",
            "Connection error",
            true,
            true,
        ),
        ErrorPattern::new(
            r"(?i)\b5\d\d\b|server error|internal server|service unavailable|bad gateway",
            ErrorType::Server,
            "The voice service is having problems right now. Please try again shortly.",
            "Server error",
            true,
            true,
        ),
    ]
});

const UNKNOWN_USER_MESSAGE: &str = "Something went wrong with the voice call. Please try again later.";
const UNKNOWN_LOG_MESSAGE: &str = "Unclassified voice error";

/// Classify a raw SDK error
pub fn get_error_details(error: &SdkError) -> ErrorDetails {
    classify_message(&error.message())
}

/// Classify an error message
pub fn classify_message(message: &str) -> ErrorDetails {
    for entry in ERROR_PATTERNS.iter() {
        if entry.pattern.is_match(message) {
            return ErrorDetails {
                error_type: entry.error_type,
                user_message: entry.user_message.to_string(),
                log_message: format!("{}: {}", entry.log_message, message),
                recoverable: entry.recoverable,
                retryable: entry.retryable,
            };
        }
    }

    ErrorDetails {
        error_type: ErrorType::Unknown,
        user_message: UNKNOWN_USER_MESSAGE.to_string(),
        log_message: format!("{}: {}", UNKNOWN_LOG_MESSAGE, message),
        recoverable: false,
        retryable: false,
    }
}

/// Options for [`report_error`]
#[derive(Default)]
pub struct ReportOptions<'a> {
    /// Log only; show no notices
    pub silent: bool,
    /// Called with the classification after logging
    pub on_error: Option<&'a (dyn Fn(&ErrorDetails) + Send + Sync)>,
}

impl<'a> ReportOptions<'a> {
    pub fn silent() -> Self {
        Self {
            silent: true,
            on_error: None,
        }
    }
}

/// Classify, log and (unless silent) show an SDK error.
///
/// Exactly one error notice is shown per non-silent call. Permission failures get a second,
/// delayed hint about microphone settings when a tokio runtime is available.
pub fn report_error(
    error: &SdkError,
    notifier: &Arc<dyn Notifier>,
    options: ReportOptions<'_>,
) -> ErrorDetails {
    let details = get_error_details(error);

    error!(
        error_type = %details.error_type,
        recoverable = details.recoverable,
        retryable = details.retryable,
        silent = options.silent,
        "{}",
        details.log_message
    );

    if !options.silent {
        notifier.notify(Notice::error(details.user_message.clone()));

        if details.error_type == ErrorType::Permission {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let notifier = notifier.clone();
                handle.spawn(async move {
                    tokio::time::sleep(PERMISSION_HINT_DELAY).await;
                    notifier.notify(Notice::info(PERMISSION_HINT));
                });
            }
        }
    }

    if let Some(on_error) = options.on_error {
        on_error(&details);
    }

    details
}
