//! The `mountguard` binary.
//!
//! Runs one monitoring session against a remote USB-access-control authority
//! and streams its domain events to the log. Commands (challenge generation,
//! verification, blocking overrides) are exposed by the orchestrator API for
//! embedding; the binary itself is the headless monitor.

use anyhow::Context;
use authority_client::{AuthorityClient, AuthorityConfig};
use clap::Parser;
use guard_config_and_utils::{logging, Config};
use session_orchestrator::{GuardEvent, OrchestratorConfig, SessionOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "mountguard",
    about = "USB access-control monitor: reconciles device state against a remote authority and gates access behind an OTP/QR challenge",
    version
)]
struct Cli {
    /// Base URL of the remote authority.
    #[arg(long, env = "MOUNTGUARD_AUTHORITY_URL")]
    authority_url: Option<String>,

    /// Default log level (trace, debug, info, warn, error).
    #[arg(long, env = "MOUNTGUARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Liveness probe cadence in milliseconds.
    #[arg(long, env = "MOUNTGUARD_PROBE_INTERVAL_MS")]
    probe_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::new();
    if let Some(url) = cli.authority_url {
        config.authority_url = url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(interval) = cli.probe_interval_ms {
        config.probe_interval_ms = interval;
    }
    config.validate().context("invalid configuration")?;

    logging::init_logging(&config.log_level);
    info!(authority_url = %config.authority_url, "Starting mountguard");

    let client = AuthorityClient::new(AuthorityConfig {
        base_url: config.authority_url.clone(),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    })
    .context("failed to build authority client")?;

    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::new(client),
        OrchestratorConfig {
            probe_interval: Duration::from_millis(config.probe_interval_ms),
            device_poll_interval: Duration::from_millis(config.device_poll_interval_ms),
            event_poll_interval: Duration::from_millis(config.event_poll_interval_ms),
            realtime_poll_interval: Duration::from_millis(config.realtime_poll_interval_ms),
            event_log_capacity: config.event_log_capacity,
        },
    ));

    let mut events = orchestrator.subscribe();
    orchestrator.clone().start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => report(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    orchestrator.shutdown();
    Ok(())
}

/// Render one domain event to the operator log.
fn report(event: &GuardEvent) {
    match event {
        GuardEvent::ServerConnected => info!("Authority connected; protection active"),
        GuardEvent::ServerDisconnected => {
            warn!("Authority disconnected; protection may be compromised")
        }
        GuardEvent::MonitoringStarted => info!("Monitoring started; auto-mount blocked"),
        GuardEvent::MonitoringStopped => info!("Monitoring stopped"),
        GuardEvent::ProtectionEnabled => info!("System-wide protection confirmed"),
        GuardEvent::DeviceArrived { name } => {
            warn!(device = %name, "Device detected; mount blocked pending authorization")
        }
        GuardEvent::DeviceRemoved { name } => info!(device = %name, "Device removed"),
        GuardEvent::ChallengeIssued { expires_at } => {
            info!(expires_at = %expires_at, "Challenge issued; scan the QR code to authorize")
        }
        GuardEvent::ChallengeIssueFailed { message } => {
            warn!(%message, "Challenge issue failed")
        }
        GuardEvent::AccessGranted => info!("Access granted; auto-mount enabled"),
        GuardEvent::AccessDenied { message } => warn!(%message, "Access denied"),
        GuardEvent::ForcedLock => warn!("USB access re-locked"),
        GuardEvent::BlockingChanged { blocked } => {
            info!(blocked, "System-wide blocking changed")
        }
    }
}
