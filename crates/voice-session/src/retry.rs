//! Retry policy for starting voice calls
//!
//! Call setup is cheap and the user is watching, so failed attempts are retried after a fixed
//! delay rather than an exponential backoff. Only failures classified as retryable are tried
//! again; everything else is reported straight away.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::classify::{get_error_details, report_error, ErrorDetails, ReportOptions};
use crate::countdown::saturating_millis;
use crate::error::{SdkError, VoiceError, VoiceResult};
use crate::notify::{Notice, Notifier};

/// Bounds for [`retry_operation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed wait between attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Run `operation`, retrying retryable failures.
///
/// The operation runs at most `policy.max_retries + 1` times. Each retry shows a
/// "Retrying connection (n/max)..." notice and calls `on_retry` with the attempt number and the
/// classification of the failure. The final failure is reported through [`report_error`] and
/// returned with the original SDK error attached.
///
/// `cancel` is checked after every delay: once set, the loop stops with
/// [`VoiceError::Cancelled`] without running the operation again.
pub async fn retry_operation<T, F, Fut>(
    policy: &RetryPolicy,
    notifier: &Arc<dyn Notifier>,
    cancel: &AtomicBool,
    mut on_retry: Option<&mut (dyn FnMut(u32, &ErrorDetails) + Send)>,
    mut operation: F,
) -> VoiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SdkError>>,
{
    let mut retries = 0;

    loop {
        debug!(
            attempt = retries + 1,
            max_attempts = policy.max_retries + 1,
            "Attempting voice operation"
        );

        match operation().await {
            Ok(result) => {
                if retries > 0 {
                    debug!(retries, "Voice operation succeeded after retries");
                }
                return Ok(result);
            }
            Err(e) => {
                let details = get_error_details(&e);

                if !details.retryable || retries >= policy.max_retries {
                    if details.retryable {
                        error!(attempts = retries + 1, error = %e, "Voice operation failed after all retry attempts");
                    } else {
                        error!(error = %e, error_type = %details.error_type, "Non-retryable voice error, not retrying");
                    }
                    let details = report_error(&e, notifier, ReportOptions::default());
                    return Err(VoiceError::Sdk { details, source: e });
                }

                retries += 1;
                warn!(
                    retry = retries,
                    max_retries = policy.max_retries,
                    error = %e,
                    error_type = %details.error_type,
                    delay_ms = saturating_millis(policy.retry_delay),
                    "Retryable voice error, will retry"
                );
                notifier.notify(Notice::info(format!(
                    "Retrying connection ({}/{})...",
                    retries, policy.max_retries
                )));
                if let Some(callback) = on_retry.as_deref_mut() {
                    callback(retries, &details);
                }

                sleep(policy.retry_delay).await;

                if cancel.load(Ordering::SeqCst) {
                    debug!(retries, "Retry loop cancelled");
                    return Err(VoiceError::Cancelled);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorType;
    use crate::notify::{RecordingNotifier, Severity};
    use std::sync::atomic::AtomicU32;

    fn recorder() -> (Arc<RecordingNotifier>, Arc<dyn Notifier>) {
        let recorder = Arc::new(RecordingNotifier::new());
        let notifier: Arc<dyn Notifier> = recorder.clone();
        (recorder, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let (recorder, notifier) = recorder();
        let attempts = AtomicU32::new(0);
        let cancel = AtomicBool::new(false);

        let result = retry_operation(&RetryPolicy::default(), &notifier, &cancel, None, || async {
            let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if current < 3 {
                Err(SdkError::text("network unreachable"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.count_containing("Retrying connection"), 2);
        assert!(recorder.with_severity(Severity::Error).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_rethrows_original() {
        let (recorder, notifier) = recorder();
        let attempts = AtomicU32::new(0);
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let mut on_retry = |n: u32, details: &ErrorDetails| seen.push((n, details.error_type));

        let result: VoiceResult<()> = retry_operation(
            &RetryPolicy::default(),
            &notifier,
            &cancel,
            Some(&mut on_retry),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::text("network timeout"))
            },
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(VoiceError::Sdk { details, source }) => {
                assert_eq!(details.error_type, ErrorType::Network);
                assert_eq!(source, SdkError::text("network timeout"));
            }
            other => panic!("expected sdk error, got {:?}", other),
        }

        let notices = recorder.notices();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].message, "Retrying connection (1/2)...");
        assert_eq!(notices[1].message, "Retrying connection (2/2)...");
        assert_eq!(notices[2].severity, Severity::Error);
        assert_eq!(seen, vec![(1, ErrorType::Network), (2, ErrorType::Network)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let (recorder, notifier) = recorder();
        let attempts = AtomicU32::new(0);
        let cancel = AtomicBool::new(false);

        let result: VoiceResult<()> =
            retry_operation(&RetryPolicy::default(), &notifier, &cancel, None, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::text("Invalid API key"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.notices()[0].severity, Severity::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let (_recorder, notifier) = recorder();
        let cancel = AtomicBool::new(false);
        let started = tokio::time::Instant::now();
        let stamps = parking_lot::Mutex::new(Vec::new());

        let _: VoiceResult<()> = retry_operation(
            &RetryPolicy::new(3, Duration::from_millis(250)),
            &notifier,
            &cancel,
            None,
            || async {
                stamps.lock().push(started.elapsed());
                Err(SdkError::text("connection reset"))
            },
        )
        .await;

        let stamps = stamps.into_inner();
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop() {
        let (_recorder, notifier) = recorder();
        let attempts = AtomicU32::new(0);
        let cancel = AtomicBool::new(false);

        let result: VoiceResult<()> =
            retry_operation(&RetryPolicy::default(), &notifier, &cancel, None, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                cancel.store(true, Ordering::SeqCst);
                Err(SdkError::text("network down"))
            })
            .await;

        assert!(matches!(result, Err(VoiceError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
