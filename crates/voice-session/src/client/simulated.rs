//! In-process voice client
//!
//! Behaves like a well-mannered SDK: `start` is acknowledged immediately and the call goes live
//! after a configurable connect delay; `stop` ends the call. Failures and remote events can be
//! scripted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use super::{EventEmitter, VoiceClient, VoiceEvent};
use crate::error::SdkError;

pub struct SimulatedVoiceClient {
    events: EventEmitter,
    connect_delay: Duration,
    start_failures: Mutex<VecDeque<SdkError>>,
    stop_failure: Mutex<Option<SdkError>>,
    mute_failure: Mutex<Option<SdkError>>,
    in_call: AtomicBool,
    muted: AtomicBool,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    last_assistant: Mutex<Option<String>>,
}

impl SimulatedVoiceClient {
    pub fn new() -> Self {
        Self::with_connect_delay(Duration::from_millis(200))
    }

    pub fn with_connect_delay(connect_delay: Duration) -> Self {
        Self {
            events: EventEmitter::default(),
            connect_delay,
            start_failures: Mutex::new(VecDeque::new()),
            stop_failure: Mutex::new(None),
            mute_failure: Mutex::new(None),
            in_call: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            last_assistant: Mutex::new(None),
        }
    }

    /// Make the next `count` start requests fail with `message`
    pub fn fail_next_starts(&self, count: u32, message: &str) {
        let mut failures = self.start_failures.lock();
        for _ in 0..count {
            failures.push_back(SdkError::text(message));
        }
    }

    /// Make the next stop request fail
    pub fn fail_next_stop(&self, error: SdkError) {
        *self.stop_failure.lock() = Some(error);
    }

    /// Make the next mute request fail
    pub fn fail_next_mute(&self, error: SdkError) {
        *self.mute_failure.lock() = Some(error);
    }

    /// Inject an event as if the SDK had produced it
    pub fn emit(&self, event: VoiceEvent) {
        if matches!(event, VoiceEvent::CallEnd | VoiceEvent::Error(_)) {
            self.in_call.store(false, Ordering::SeqCst);
        }
        self.events.emit(event);
    }

    /// The remote side hung up
    pub fn hang_up_remotely(&self) {
        self.emit(VoiceEvent::CallEnd);
    }

    pub fn is_in_call(&self) -> bool {
        self.in_call.load(Ordering::SeqCst)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn last_assistant(&self) -> Option<String> {
        self.last_assistant.lock().clone()
    }
}

impl Default for SimulatedVoiceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceClient for SimulatedVoiceClient {
    async fn start(&self, assistant_id: &str) -> Result<(), SdkError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_assistant.lock() = Some(assistant_id.to_string());

        if let Some(error) = self.start_failures.lock().pop_front() {
            debug!(assistant_id, error = %error, "Simulated start failure");
            return Err(error);
        }

        let events = self.events.clone();
        let delay = self.connect_delay;
        self.in_call.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(VoiceEvent::CallStart);
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), SdkError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.stop_failure.lock().take() {
            return Err(error);
        }
        if self.in_call.swap(false, Ordering::SeqCst) {
            self.events.emit(VoiceEvent::CallEnd);
        }
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> Result<(), SdkError> {
        if let Some(error) = self.mute_failure.lock().take() {
            return Err(error);
        }
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.events.subscribe()
    }
}
