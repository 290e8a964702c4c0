//! User-facing notifications
//!
//! The session controller never renders anything itself. It hands plain strings with a severity
//! and a display duration to a [`Notifier`], which may forward them to a toast system, a terminal
//! or a test buffer. Each notifier owns its own id counter, so two sessions never share
//! notification state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::countdown::saturating_millis;

/// How long success notices stay visible
pub const SUCCESS_DURATION: Duration = Duration::from_secs(3);
/// How long informational notices stay visible
pub const INFO_DURATION: Duration = Duration::from_secs(3);
/// How long warnings stay visible
pub const WARNING_DURATION: Duration = Duration::from_secs(5);
/// How long error notices stay visible
pub const ERROR_DURATION: Duration = Duration::from_secs(5);

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

/// Opaque identifier returned for every notice shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoticeId(pub u64);

/// A single user-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub duration: Duration,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message, SUCCESS_DURATION)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message, INFO_DURATION)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, WARNING_DURATION)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message, ERROR_DURATION)
    }

    pub fn new(severity: Severity, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            severity,
            message: message.into(),
            duration,
        }
    }
}

/// Receiver of user-facing notifications.
///
/// Implementations must not block: the session calls this from timer ticks and event handlers.
pub trait Notifier: Send + Sync {
    /// Show a notice and return its identifier
    fn notify(&self, notice: Notice) -> NoticeId;
}

/// Notifier that writes every notice to the tracing log
#[derive(Debug, Default)]
pub struct TracingNotifier {
    next_id: AtomicU64,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) -> NoticeId {
        let id = NoticeId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let duration_ms = saturating_millis(notice.duration);
        match notice.severity {
            Severity::Error => error!(notice_id = id.0, duration_ms, "{}", notice.message),
            Severity::Warning => warn!(notice_id = id.0, duration_ms, "{}", notice.message),
            Severity::Success | Severity::Info => {
                info!(notice_id = id.0, duration_ms, severity = ?notice.severity, "{}", notice.message)
            }
        }
        id
    }
}

/// Notifier that keeps every notice in memory.
///
/// Useful for consumers that poll for new notices, and for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeId, Notice)>>,
    next_id: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices shown so far, oldest first
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    /// Remove and return all recorded notices
    pub fn drain(&self) -> Vec<Notice> {
        self.notices.lock().drain(..).map(|(_, n)| n).collect()
    }

    /// Notices of one severity, oldest first
    pub fn with_severity(&self, severity: Severity) -> Vec<Notice> {
        self.notices
            .lock()
            .iter()
            .filter(|(_, n)| n.severity == severity)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Number of notices whose message contains `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|(_, n)| n.message.contains(needle))
            .count()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) -> NoticeId {
        let id = NoticeId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.notices.lock().push((id, notice));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_ids_are_per_instance() {
        let a = RecordingNotifier::new();
        let b = RecordingNotifier::new();

        assert_eq!(a.notify(Notice::info("one")), NoticeId(1));
        assert_eq!(a.notify(Notice::info("two")), NoticeId(2));
        assert_eq!(b.notify(Notice::info("other")), NoticeId(1));
    }

    #[test]
    fn test_recording_notifier_filters() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::success("Call connected"));
        notifier.notify(Notice::error("Network error"));
        notifier.notify(Notice::error("Network error again"));

        assert_eq!(notifier.len(), 3);
        assert_eq!(notifier.with_severity(Severity::Error).len(), 2);
        assert_eq!(notifier.count_containing("Network"), 2);

        let drained = notifier.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(notifier.len(), 0);
    }

    #[test]
    fn test_default_durations() {
        assert_eq!(Notice::success("x").duration, SUCCESS_DURATION);
        assert_eq!(Notice::error("x").duration, ERROR_DURATION);
        assert_eq!(Notice::warning("x").severity, Severity::Warning);
    }
}
