//! LORO voice call simulator
//!
//! Runs a voice session against the in-process client so timer, retry and error handling can be
//! watched from a terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::time::{interval, Instant};
use tracing::{info, warn};

use loro_voice_session::classify::classify_message;
use loro_voice_session::logging::{parse_log_level, setup_logging, LogFormat, LoggingConfig};
use loro_voice_session::{
    SimulatedVoiceClient, StaticAuth, TracingNotifier, VoiceConfig, VoiceSession,
};

#[derive(Parser, Debug)]
#[command(name = "loro-voice", author, version, about = "Timed voice-call session simulator", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LORO_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Include file and line in log lines
    #[arg(long, global = true)]
    log_source: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place one simulated call and print the countdown until it ends
    Simulate(SimulateArgs),
    /// Classify an error message and print the result as JSON
    Classify {
        /// Raw error message, as an SDK would report it
        message: String,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Assistant to call
    #[arg(long, env = "LORO_VOICE_ASSISTANT_ID", default_value = "simulated-assistant")]
    assistant_id: String,

    /// Key handed to the client factory
    #[arg(long, env = "LORO_VOICE_API_KEY", default_value = "simulated-key", hide_env_values = true)]
    api_key: String,

    /// Maximum call length in minutes
    #[arg(long)]
    max_minutes: Option<f64>,

    /// Warn when this many seconds are left
    #[arg(long)]
    warning_seconds: Option<f64>,

    /// Number of start attempts that fail before the call connects
    #[arg(long, default_value = "0")]
    fail_starts: u32,

    /// Error message used for the failed start attempts
    #[arg(long, default_value = "network connection reset")]
    fail_message: String,

    /// Hang up after this many seconds instead of waiting for the time limit
    #[arg(long)]
    hang_up_after: Option<f64>,

    /// Delay between the start request and the call-start event
    #[arg(long, default_value = "200")]
    connect_delay_ms: u64,

    /// Mute the microphone once connected
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = parse_log_level(&cli.log_level)?;
    let format = if cli.json { LogFormat::Json } else { LogFormat::Text };
    let logging = LoggingConfig::new(level)
        .format(format)
        .source_location(cli.log_source);
    setup_logging(&logging)?;

    match cli.command {
        Command::Simulate(args) => simulate(args).await,
        Command::Classify { message } => {
            let details = classify_message(&message);
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
    }
}

fn build_config(args: &SimulateArgs) -> Result<VoiceConfig> {
    let mut config = VoiceConfig::from_env()
        .with_api_key(args.api_key.clone())
        .with_assistant_id(args.assistant_id.clone());

    if let Some(minutes) = args.max_minutes {
        let duration = positive_duration("--max-minutes", minutes, 60.0)?;
        config = config.with_max_call_duration(duration);
    }
    if let Some(seconds) = args.warning_seconds {
        let threshold = positive_duration("--warning-seconds", seconds, 1.0)?;
        config = config.with_warning_threshold(threshold);
    }
    Ok(config)
}

/// `value` units of `unit_secs` seconds; rejects non-positive and unrepresentable values
fn positive_duration(flag: &str, value: f64, unit_secs: f64) -> Result<Duration> {
    ensure!(value > 0.0, "{} must be positive", flag);
    let duration = Duration::try_from_secs_f64(value * unit_secs)
        .with_context(|| format!("{} is out of range: {}", flag, value))?;
    ensure!(!duration.is_zero(), "{} is too small: {}", flag, value);
    Ok(duration)
}

async fn simulate(args: SimulateArgs) -> Result<()> {
    let config = build_config(&args)?;
    let hang_up_after = args
        .hang_up_after
        .map(|secs| {
            ensure!(secs >= 0.0, "--hang-up-after must not be negative");
            Duration::try_from_secs_f64(secs)
                .with_context(|| format!("--hang-up-after is out of range: {}", secs))
        })
        .transpose()?;

    let client = Arc::new(SimulatedVoiceClient::with_connect_delay(Duration::from_millis(
        args.connect_delay_ms,
    )));
    if args.fail_starts > 0 {
        client.fail_next_starts(args.fail_starts, &args.fail_message);
    }

    let session = VoiceSession::builder(config)
        .auth(Arc::new(StaticAuth::with_token("simulator")))
        .notifier(Arc::new(TracingNotifier::new()))
        .client(client)
        .build()
        .context("failed to build voice session")?;

    session.start_call().await.context("call did not start")?;

    let mut ticker = interval(Duration::from_secs(1));
    let mut connected_at: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, hanging up");
                session.end_call().await?;
            }
        }

        let snapshot = session.snapshot();
        if !snapshot.is_active && !snapshot.is_initializing {
            break;
        }
        if !snapshot.is_active {
            println!("connecting...");
            continue;
        }

        let started = *connected_at.get_or_insert_with(|| {
            if args.mute {
                if let Err(e) = session.toggle_mute() {
                    warn!(error = %e, "Could not mute microphone");
                }
            }
            Instant::now()
        });

        if let Some(display) = snapshot.remaining_display {
            println!("{}{}", display, if snapshot.is_muted { "  (muted)" } else { "" });
        }

        if hang_up_after.is_some_and(|after| started.elapsed() >= after) {
            session.end_call().await?;
        }
    }

    let summary = session.snapshot();
    session.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_duration() {
        assert_eq!(
            positive_duration("--max-minutes", 0.5, 60.0).unwrap(),
            Duration::from_secs(30)
        );
        assert!(positive_duration("--max-minutes", 1e300, 60.0).is_err());
        assert!(positive_duration("--warning-seconds", f64::INFINITY, 1.0).is_err());
        assert!(positive_duration("--warning-seconds", f64::NAN, 1.0).is_err());
        assert!(positive_duration("--warning-seconds", -1.0, 1.0).is_err());
        assert!(positive_duration("--warning-seconds", 1e-300, 1.0).is_err());
    }

    #[test]
    fn test_cli_parses_simulate_flags() {
        let cli = Cli::try_parse_from([
            "loro-voice",
            "--json",
            "simulate",
            "--max-minutes",
            "1e300",
            "--fail-starts",
            "2",
        ])
        .unwrap();
        assert!(cli.json);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.fail_starts, 2);
        assert!(build_config(&args).is_err());
    }
}
