//! Voice SDK boundary
//!
//! The voice SDK is a black box that accepts three commands (start, stop, mute) and reports what
//! happened through a stream of [`VoiceEvent`]s. Implement [`VoiceClient`] to plug a real SDK in;
//! [`SimulatedVoiceClient`] is an in-process stand-in.

mod simulated;

pub use simulated::SimulatedVoiceClient;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::SdkError;

/// Events emitted by a voice SDK client
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// The SDK confirmed that the call is live
    CallStart,
    /// The call ended, on either side
    CallEnd,
    /// Assistant volume level (0.0 to 1.0)
    VolumeLevel(f32),
    /// The SDK reported a failure
    Error(SdkError),
}

/// Commands and event subscription offered by a voice SDK
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Ask the SDK to place a call with the given assistant.
    ///
    /// Returning `Ok` only means the request was accepted; the call is live once
    /// [`VoiceEvent::CallStart`] arrives.
    async fn start(&self, assistant_id: &str) -> Result<(), SdkError>;

    /// Ask the SDK to end the current call
    async fn stop(&self) -> Result<(), SdkError>;

    /// Mute or unmute the microphone
    fn set_muted(&self, muted: bool) -> Result<(), SdkError>;

    /// Subscribe to SDK events
    fn subscribe(&self) -> broadcast::Receiver<VoiceEvent>;
}

/// Broadcast-based event emitter for client implementations
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<VoiceEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: VoiceEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
