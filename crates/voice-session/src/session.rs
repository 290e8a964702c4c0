//! Voice call session controller
//!
//! [`VoiceSession`] turns UI intents (start, end, mute) into SDK commands and reflects SDK events
//! back into a [`SessionSnapshot`]. At most one call is active per session.
//!
//! # Two-phase start
//!
//! ```text
//!  start_call() ──► retry_operation(client.start) ──► Ok: still initializing
//!                                                          │
//!  event bridge ◄──────────── VoiceEvent::CallStart ◄──────┘
//!       │
//!       └──► active, countdown armed, "Call connected"
//! ```
//!
//! The countdown is armed by the SDK's call-start event, never by the start request itself, so a
//! slow or failing connection does not eat into the user's call time.
//!
//! # Teardown
//!
//! A call ends through `end_call`, a remote call-end event, an SDK error, the countdown reaching
//! zero, or `shutdown`/drop. Every path goes through the same idempotent teardown, which cancels
//! the ticker and clears the countdown, so "Call ended" is shown once per call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthProvider, StaticAuth};
use crate::classify::{report_error, ErrorDetails, ReportOptions};
use crate::client::{VoiceClient, VoiceEvent};
use crate::config::VoiceConfig;
use crate::countdown::{saturating_millis, Countdown, TICK_INTERVAL};
use crate::error::{SdkError, VoiceError, VoiceResult};
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::retry::retry_operation;

/// Identifier of one confirmed call
pub type CallId = Uuid;

pub const MSG_CALL_CONNECTED: &str = "Call connected";
pub const MSG_CALL_ENDED: &str = "Call ended";
pub const MSG_TIME_LIMIT_REACHED: &str = "Call time limit reached";
pub const MSG_ALREADY_ACTIVE: &str = "A call is already in progress";
pub const MSG_ALREADY_CONNECTING: &str = "A call is already connecting";
pub const MSG_NOT_AUTHENTICATED: &str = "Please sign in to start a voice call";
pub const MSG_CLIENT_UNAVAILABLE: &str =
    "The voice assistant is not available right now. Please refresh and try again";

/// Point-in-time view of a session, for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub is_active: bool,
    pub is_initializing: bool,
    pub is_muted: bool,
    pub volume_level: f32,
    pub call_id: Option<CallId>,
    pub started_at: Option<DateTime<Utc>>,
    pub remaining_ms: Option<u64>,
    pub remaining_display: Option<String>,
    pub last_error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    HangUp,
    Remote,
    TimeLimit,
    Error,
    Shutdown,
}

impl EndReason {
    fn announces(&self) -> bool {
        matches!(self, Self::HangUp | Self::Remote | Self::TimeLimit)
    }
}

struct SessionState {
    is_active: bool,
    is_initializing: bool,
    is_muted: bool,
    volume_level: f32,
    call_id: Option<CallId>,
    started_at: Option<DateTime<Utc>>,
    last_error: Option<ErrorDetails>,
    countdown: Countdown,
    ticker: Option<JoinHandle<()>>,
}

struct SessionInner {
    config: VoiceConfig,
    auth: Arc<dyn AuthProvider>,
    notifier: Arc<dyn Notifier>,
    client: Option<Arc<dyn VoiceClient>>,
    state: Mutex<SessionState>,
    disposed: AtomicBool,
}

/// Builder for [`VoiceSession`]
pub struct VoiceSessionBuilder {
    config: VoiceConfig,
    auth: Option<Arc<dyn AuthProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    client: Option<Arc<dyn VoiceClient>>,
    factory: Option<Box<dyn FnOnce(&str) -> Arc<dyn VoiceClient> + Send>>,
}

impl VoiceSessionBuilder {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            config,
            auth: None,
            notifier: None,
            client: None,
            factory: None,
        }
    }

    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use an already constructed client
    pub fn client(mut self, client: Arc<dyn VoiceClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Construct the client from the configured API key at build time.
    ///
    /// The factory only runs when the user is authenticated and an API key is configured.
    pub fn client_factory<F, C>(mut self, factory: F) -> Self
    where
        F: FnOnce(&str) -> Arc<C> + Send + 'static,
        C: VoiceClient + 'static,
    {
        self.factory = Some(Box::new(move |api_key: &str| -> Arc<dyn VoiceClient> {
            factory(api_key)
        }));
        self
    }

    /// Build the session; must be called inside a tokio runtime
    pub fn build(self) -> VoiceResult<VoiceSession> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| VoiceError::internal("VoiceSession must be built inside a tokio runtime"))?;

        if self.config.max_call_duration.is_zero() {
            return Err(VoiceError::config("max call duration must be positive"));
        }

        let auth = self
            .auth
            .unwrap_or_else(|| Arc::new(StaticAuth::anonymous()) as Arc<dyn AuthProvider>);
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier::new()) as Arc<dyn Notifier>);

        let client = match (self.client, self.factory) {
            (Some(client), _) => Some(client),
            (None, Some(factory)) => {
                if !auth.has_credentials() {
                    debug!("Not authenticated, voice client not created");
                    None
                } else if let Some(api_key) = self.config.api_key.as_deref() {
                    Some(factory(api_key))
                } else {
                    warn!("No voice API key configured, voice client not created");
                    None
                }
            }
            (None, None) => None,
        };

        let countdown = Countdown::new(
            self.config.max_call_duration,
            self.config.warning_threshold,
        );
        let inner = Arc::new(SessionInner {
            config: self.config,
            auth,
            notifier,
            client,
            state: Mutex::new(SessionState {
                is_active: false,
                is_initializing: false,
                is_muted: false,
                volume_level: 0.0,
                call_id: None,
                started_at: None,
                last_error: None,
                countdown,
                ticker: None,
            }),
            disposed: AtomicBool::new(false),
        });

        let bridge = inner.client.as_ref().map(|client| {
            let receiver = client.subscribe();
            runtime.spawn(run_event_bridge(inner.clone(), receiver))
        });

        info!(
            has_client = inner.client.is_some(),
            max_call_secs = inner.config.max_call_duration.as_secs(),
            warning_secs = inner.config.warning_threshold.as_secs(),
            "Voice session ready"
        );

        Ok(VoiceSession {
            inner,
            bridge: Mutex::new(bridge),
        })
    }
}

/// Owner of one voice call session.
///
/// Dropping the session cancels the countdown and the event bridge and stops an active call on a
/// best-effort basis; call [`VoiceSession::shutdown`] to wait for the stop.
pub struct VoiceSession {
    inner: Arc<SessionInner>,
    bridge: Mutex<Option<JoinHandle<()>>>,
}

impl VoiceSession {
    pub fn builder(config: VoiceConfig) -> VoiceSessionBuilder {
        VoiceSessionBuilder::new(config)
    }

    /// Ask the SDK to start a call.
    ///
    /// Returns once the request was accepted; the call becomes active when the SDK confirms it.
    /// Starting while a call is active or connecting is a no-op with an informational notice.
    pub async fn start_call(&self) -> VoiceResult<()> {
        self.inner.start_call().await
    }

    /// End the current call. Without an active call this only clears a pending start.
    pub async fn end_call(&self) -> VoiceResult<()> {
        self.inner.end_call_with(EndReason::HangUp).await
    }

    /// Flip the microphone mute state of the active call and return the new state.
    ///
    /// Does nothing without an active call. SDK failures are logged, not shown.
    pub fn toggle_mute(&self) -> VoiceResult<bool> {
        self.inner.toggle_mute()
    }

    /// Start again unless a call is active or connecting
    pub async fn retry_last_call(&self) -> VoiceResult<()> {
        let idle = {
            let state = self.inner.state.lock();
            !state.is_active && !state.is_initializing
        };
        if idle {
            self.inner.start_call().await
        } else {
            debug!("Retry ignored: call active or connecting");
            Ok(())
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock();
        SessionSnapshot {
            is_active: state.is_active,
            is_initializing: state.is_initializing,
            is_muted: state.is_muted,
            volume_level: state.volume_level,
            call_id: state.call_id,
            started_at: state.started_at,
            remaining_ms: state.countdown.remaining().map(saturating_millis),
            remaining_display: state.countdown.format_remaining(),
            last_error: state.last_error.clone(),
        }
    }

    /// Remaining call time as `MM:SS`, if a call is active
    pub fn remaining_display(&self) -> Option<String> {
        self.inner.state.lock().countdown.format_remaining()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().is_active
    }

    pub fn has_client(&self) -> bool {
        self.inner.client.is_some()
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.inner.config
    }

    /// Detach from the SDK: stop listening for events, stop an active call and cancel pending
    /// retries.
    pub async fn shutdown(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        let bridge = self.bridge.lock().take();
        if let Some(bridge) = bridge {
            bridge.abort();
        }

        let was_active = self.inner.state.lock().is_active;
        if was_active {
            if let Some(client) = self.inner.client.clone() {
                if let Err(e) = client.stop().await {
                    report_error(&e, &self.inner.notifier, ReportOptions::silent());
                }
            }
        }
        self.inner.teardown(EndReason::Shutdown);
        debug!("Voice session shut down");
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        if let Some(bridge) = self.bridge.get_mut().take() {
            bridge.abort();
        }

        if self.inner.teardown(EndReason::Shutdown) {
            if let (Some(client), Ok(runtime)) = (
                self.inner.client.clone(),
                tokio::runtime::Handle::try_current(),
            ) {
                runtime.spawn(async move {
                    if let Err(e) = client.stop().await {
                        warn!(error = %e, "Failed to stop voice call on drop");
                    }
                });
            }
        }
    }
}

impl SessionInner {
    async fn start_call(&self) -> VoiceResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(VoiceError::Cancelled);
        }

        if !self.auth.has_credentials() {
            warn!("Voice call requested without authentication");
            self.notifier.notify(Notice::error(MSG_NOT_AUTHENTICATED));
            return Err(VoiceError::NotAuthenticated);
        }

        let Some(client) = self.client.clone() else {
            error!("Voice call requested but the voice client is not initialized");
            self.notifier.notify(Notice::error(MSG_CLIENT_UNAVAILABLE));
            return Err(VoiceError::ClientUnavailable);
        };

        let busy = {
            let mut state = self.state.lock();
            if state.is_active {
                Some(MSG_ALREADY_ACTIVE)
            } else if state.is_initializing {
                Some(MSG_ALREADY_CONNECTING)
            } else {
                state.is_initializing = true;
                state.last_error = None;
                None
            }
        };
        if let Some(message) = busy {
            info!("{}", message);
            self.notifier.notify(Notice::info(message));
            return Ok(());
        }

        let Some(assistant_id) = self.config.assistant_id.clone() else {
            let source = SdkError::text("Assistant ID is not configured");
            let details = report_error(&source, &self.notifier, ReportOptions::default());
            self.fail_start(Some(&details));
            return Err(VoiceError::Sdk { details, source });
        };

        info!(assistant_id = %assistant_id, "Starting voice call");

        let mut on_retry = |attempt: u32, details: &ErrorDetails| {
            debug!(attempt, error_type = %details.error_type, "Retrying voice call start");
            self.state.lock().last_error = Some(details.clone());
        };

        let result = retry_operation(
            &self.config.retry,
            &self.notifier,
            &self.disposed,
            Some(&mut on_retry),
            || {
                let client = client.clone();
                let assistant_id = assistant_id.clone();
                async move { client.start(&assistant_id).await }
            },
        )
        .await;

        match result {
            Ok(()) => {
                debug!("Start request accepted, waiting for call-start");
                Ok(())
            }
            Err(e) => {
                self.fail_start(e.details());
                Err(e)
            }
        }
    }

    fn fail_start(&self, details: Option<&ErrorDetails>) {
        let mut state = self.state.lock();
        state.is_initializing = false;
        if let Some(details) = details {
            state.last_error = Some(details.clone());
        }
    }

    async fn end_call_with(&self, reason: EndReason) -> VoiceResult<()> {
        let client = self.client.clone().ok_or(VoiceError::ClientUnavailable)?;

        {
            let mut state = self.state.lock();
            if !state.is_active {
                state.is_initializing = false;
                return Ok(());
            }
            // Disarm before awaiting stop so no tick can land while the SDK winds down.
            state.countdown.disarm();
            if let Some(ticker) = state.ticker.take() {
                ticker.abort();
            }
        }

        info!(reason = ?reason, "Ending voice call");
        if let Err(e) = client.stop().await {
            report_error(&e, &self.notifier, ReportOptions::silent());
        }
        self.teardown(reason);
        Ok(())
    }

    fn toggle_mute(&self) -> VoiceResult<bool> {
        let muted = {
            let state = self.state.lock();
            if !state.is_active {
                return Ok(state.is_muted);
            }
            !state.is_muted
        };

        let client = self.client.clone().ok_or(VoiceError::ClientUnavailable)?;
        match client.set_muted(muted) {
            Ok(()) => {
                let mut state = self.state.lock();
                if state.is_active {
                    state.is_muted = muted;
                }
                debug!(muted, "Microphone mute toggled");
                Ok(state.is_muted)
            }
            Err(source) => {
                let details = report_error(&source, &self.notifier, ReportOptions::silent());
                Err(VoiceError::Sdk { details, source })
            }
        }
    }

    fn handle_event(self: &Arc<Self>, event: VoiceEvent) {
        match event {
            VoiceEvent::CallStart => self.on_call_start(),
            VoiceEvent::CallEnd => {
                self.teardown(EndReason::Remote);
            }
            VoiceEvent::VolumeLevel(level) => {
                let mut state = self.state.lock();
                if state.is_active {
                    state.volume_level = level.clamp(0.0, 1.0);
                }
            }
            VoiceEvent::Error(e) => self.on_sdk_error(e),
        }
    }

    fn on_call_start(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let call_id = {
            let mut state = self.state.lock();
            if state.is_active {
                debug!("Duplicate call-start ignored");
                return;
            }

            let call_id = Uuid::new_v4();
            let armed_at = Instant::now();
            state.is_active = true;
            state.is_initializing = false;
            state.is_muted = false;
            state.last_error = None;
            state.call_id = Some(call_id);
            state.started_at = Some(Utc::now());
            state.countdown.arm(armed_at);
            if let Some(stale) = state.ticker.take() {
                stale.abort();
            }
            state.ticker = Some(tokio::spawn(run_countdown(self.clone(), armed_at)));
            call_id
        };

        info!(%call_id, "Voice call started");
        self.notifier.notify(Notice::success(MSG_CALL_CONNECTED));
    }

    fn on_sdk_error(&self, error: SdkError) {
        let details = report_error(&error, &self.notifier, ReportOptions::default());
        self.teardown(EndReason::Error);
        self.state.lock().last_error = Some(details);
    }

    /// Reset to idle. Returns whether a call was active.
    fn teardown(&self, reason: EndReason) -> bool {
        let (was_active, call_id) = {
            let mut state = self.state.lock();
            let was_active = state.is_active;
            state.is_active = false;
            state.is_initializing = false;
            state.is_muted = false;
            state.volume_level = 0.0;
            state.started_at = None;
            let call_id = state.call_id.take();
            state.countdown.disarm();
            if let Some(ticker) = state.ticker.take() {
                ticker.abort();
            }
            (was_active, call_id)
        };

        if was_active {
            info!(call_id = ?call_id, reason = ?reason, "Voice call ended");
            if reason.announces() {
                self.notifier.notify(Notice::success(MSG_CALL_ENDED));
            }
        }
        was_active
    }
}

async fn run_event_bridge(inner: Arc<SessionInner>, receiver: broadcast::Receiver<VoiceEvent>) {
    let mut events = BroadcastStream::new(receiver);
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                debug!(event = ?event, "Voice event");
                inner.handle_event(event);
            }
            Err(e) => {
                warn!(error = %e, "Voice event bridge lagged, events dropped");
            }
        }
    }
    debug!("Voice event stream closed");
}

async fn run_countdown(inner: Arc<SessionInner>, armed_at: Instant) {
    let mut ticker = interval_at(armed_at + TICK_INTERVAL, TICK_INTERVAL);
    loop {
        ticker.tick().await;

        let report = inner.state.lock().countdown.tick(Instant::now());
        let Some(report) = report else {
            debug!("Countdown tick after teardown ignored");
            return;
        };

        if report.warn {
            let secs = (report.remaining.as_millis() + 999) / 1000;
            inner
                .notifier
                .notify(Notice::warning(format!("{} seconds remaining in this call", secs)));
        }

        if report.expired {
            // Detach rather than abort: this task is the one ending the call.
            drop(inner.state.lock().ticker.take());
            info!("Voice call reached its time limit");
            inner.notifier.notify(Notice::info(MSG_TIME_LIMIT_REACHED));
            if let Err(e) = inner.end_call_with(EndReason::TimeLimit).await {
                error!(error = %e, "Failed to end voice call at time limit");
            }
            return;
        }
    }
}
