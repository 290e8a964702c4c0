//! # LORO Voice Session - Timed Voice-Assistant Calls
//!
//! This crate mediates between an application and an external voice-assistant SDK. It owns a single
//! call session at a time, enforces a hard ceiling on call duration, classifies SDK failures into
//! user-facing feedback and retries transient start failures.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use loro_voice_session::{
//!     StaticAuth, TracingNotifier, VoiceConfig, VoiceSessionBuilder,
//!     client::SimulatedVoiceClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VoiceConfig::from_env();
//!     let session = VoiceSessionBuilder::new(config)
//!         .auth(Arc::new(StaticAuth::with_token("token")))
//!         .notifier(Arc::new(TracingNotifier::new()))
//!         .client_factory(|_api_key| Arc::new(SimulatedVoiceClient::new()))
//!         .build()?;
//!
//!     // Asking to start is not the same as being connected: the countdown is only armed
//!     // once the SDK confirms with a call-start event.
//!     session.start_call().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     println!("{:?}", session.snapshot());
//!
//!     session.end_call().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐      start / stop / mute       ┌──────────────────┐
//! │  VoiceSession            │ ─────────────────────────────► │  VoiceClient     │
//! │  (lifecycle controller)  │                                │  (SDK boundary)  │
//! │  ┌────────────────────┐  │ ◄───── VoiceEvent stream ───── │                  │
//! │  │ Countdown task     │  │        (event bridge)          └──────────────────┘
//! │  └────────────────────┘  │
//! └────────────┬─────────────┘
//!              │ classify / retry
//! ┌────────────▼─────────────┐
//! │  classify + retry        │ ───► Notifier (toasts), tracing (logs)
//! └──────────────────────────┘
//! ```

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod countdown;
pub mod error;
pub mod logging;
pub mod notify;
pub mod retry;
pub mod session;

// Re-export main types
pub use auth::{AuthProvider, StaticAuth};
pub use classify::{get_error_details, report_error, ErrorDetails, ErrorType, ReportOptions};
pub use client::{SimulatedVoiceClient, VoiceClient, VoiceEvent};
pub use config::VoiceConfig;
pub use countdown::{format_mm_ss, Countdown, TickReport};
pub use error::{SdkError, VoiceError, VoiceResult};
pub use notify::{Notice, NoticeId, Notifier, RecordingNotifier, Severity, TracingNotifier};
pub use retry::{retry_operation, RetryPolicy};
pub use session::{CallId, SessionSnapshot, VoiceSession, VoiceSessionBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
