//! Session orchestration for Mountguard.
//!
//! Owns the polling timers (liveness, device list, event list, fast change
//! detection), drives the per-endpoint in-flight discipline, applies the
//! session policy (auto-start monitoring on connect, auto-challenge on
//! arrival, force-lock on disconnect), and exposes one consistent snapshot
//! plus a broadcast stream of domain events.
//!
//! Each poll kind runs in its own loop that awaits the in-flight request
//! before honoring the next tick, so polls of the same kind are never
//! concurrent with each other. Across kinds there is no ordering guarantee;
//! the event log's dedup absorbs the overlap.

mod events;
mod session;

pub use events::GuardEvent;
pub use session::StatusSnapshot;

use authority_client::{Authority, AuthorityError};
use authorization_gate::{ChallengeOrigin, GateError, GateState};
use chrono::Utc;
use device_registry::{arrival_event, departure_event};
use guard_protocol_types::{Challenge, EventStatus, SecurityEvent, UsbDevice};
use session::GuardSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the domain-event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Action recorded when the authority link comes up.
const ACTION_SERVER_CONNECTED: &str = "Server Connected";

/// Action recorded when the authority link goes down.
const ACTION_SERVER_DISCONNECTED: &str = "Server Disconnected";

/// Polling cadences and log sizing.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Liveness probe cadence.
    pub probe_interval: Duration,
    /// Full device-list poll cadence.
    pub device_poll_interval: Duration,
    /// Incremental event poll cadence.
    pub event_poll_interval: Duration,
    /// Fast change-detection cadence (active only while monitoring).
    pub realtime_poll_interval: Duration,
    /// Retained event window.
    pub event_log_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
            device_poll_interval: Duration::from_millis(500),
            event_poll_interval: Duration::from_secs(1),
            realtime_poll_interval: Duration::from_millis(250),
            event_log_capacity: event_log::DEFAULT_CAPACITY,
        }
    }
}

/// Errors surfaced by orchestrator commands.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Authority(#[from] AuthorityError),
}

/// Wires the monitoring components together on a shared set of timers.
pub struct SessionOrchestrator {
    authority: Arc<dyn Authority>,
    session: Arc<RwLock<GuardSession>>,
    event_tx: broadcast::Sender<GuardEvent>,
    config: OrchestratorConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionOrchestrator {
    /// Create an orchestrator around the given authority.
    ///
    /// Nothing runs until [`start`](Self::start); the poll steps can also be
    /// driven manually with the `*_once` methods, which is what the tests do.
    pub fn new(authority: Arc<dyn Authority>, config: OrchestratorConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session = Arc::new(RwLock::new(GuardSession::new(
            authority.clone(),
            config.event_log_capacity,
        )));
        Self {
            authority,
            session,
            event_tx,
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to the domain-event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.event_tx.subscribe()
    }

    /// Read-only combined view of the session.
    pub async fn snapshot(&self) -> StatusSnapshot {
        self.session.read().await.snapshot()
    }

    /// Spawn the polling loops.
    ///
    /// Each loop awaits its in-flight request to completion before honoring
    /// the next tick, which is the per-endpoint serialization the diff logic
    /// depends on.
    pub fn start(self: Arc<Self>) {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        if !tasks.is_empty() {
            debug!("Orchestrator already started");
            return;
        }
        info!(
            probe_ms = self.config.probe_interval.as_millis() as u64,
            device_ms = self.config.device_poll_interval.as_millis() as u64,
            event_ms = self.config.event_poll_interval.as_millis() as u64,
            realtime_ms = self.config.realtime_poll_interval.as_millis() as u64,
            "Starting monitoring loops"
        );

        let orchestrator = self.clone();
        let period = self.config.probe_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = poll_ticker(period);
            loop {
                ticker.tick().await;
                orchestrator.probe_once().await;
            }
        }));

        let orchestrator = self.clone();
        let period = self.config.device_poll_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = poll_ticker(period);
            loop {
                ticker.tick().await;
                orchestrator.poll_devices_once().await;
            }
        }));

        let orchestrator = self.clone();
        let period = self.config.event_poll_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = poll_ticker(period);
            loop {
                ticker.tick().await;
                orchestrator.poll_events_once().await;
            }
        }));

        let orchestrator = self.clone();
        let period = self.config.realtime_poll_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = poll_ticker(period);
            loop {
                ticker.tick().await;
                orchestrator.poll_realtime_once().await;
            }
        }));
    }

    /// Tear the session down: cancel all timers.
    ///
    /// Requests still in flight are dropped with their tasks, so late
    /// completions never touch released state.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Monitoring loops stopped");
    }

    // ========================================================================
    // Poll steps
    // ========================================================================

    /// One liveness probe: detect connection edges and apply the
    /// connect/disconnect policy.
    pub async fn probe_once(&self) {
        let probe_ok = self.authority.probe().await.is_ok();
        let now = Utc::now();

        let mut session = self.session.write().await;
        match session.monitor.observe(probe_ok, now) {
            Some(connection_monitor::ConnectionEdge::Connected) => {
                session.log.record_local(SecurityEvent::new(
                    now,
                    ACTION_SERVER_CONNECTED,
                    None,
                    EventStatus::Connected,
                ));
                self.emit(GuardEvent::ServerConnected);

                // Server-side enforcement first, then the auto-start policy.
                // The guard keeps this to once per connection, not per tick.
                match self.authority.enable_protection().await {
                    Ok(()) => self.emit(GuardEvent::ProtectionEnabled),
                    Err(err) => warn!(error = %err, "Failed to enable protection"),
                }
                if !session.monitoring && !session.auto_started {
                    match self.authority.start_monitoring(true).await {
                        Ok(()) => {
                            session.monitoring = true;
                            session.auto_started = true;
                            self.emit(GuardEvent::MonitoringStarted);
                        }
                        Err(err) => warn!(error = %err, "Auto-start monitoring failed"),
                    }
                }
            }
            Some(connection_monitor::ConnectionEdge::Disconnected) => {
                session.gate.force_lock();
                session.monitoring = false;
                session.auto_started = false;
                session.log.record_local(SecurityEvent::new(
                    now,
                    ACTION_SERVER_DISCONNECTED,
                    None,
                    EventStatus::Disconnected,
                ));
                self.emit(GuardEvent::ServerDisconnected);
                self.emit(GuardEvent::ForcedLock);
            }
            None => {}
        }
    }

    /// One full device-list poll.
    pub async fn poll_devices_once(&self) {
        let response = match self.authority.list_devices().await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Device poll failed");
                return;
            }
        };

        let mut session = self.session.write().await;
        session.monitoring = response.monitoring;
        self.ingest_devices(&mut session, response.devices).await;
    }

    /// One fast change-detection poll. Skipped unless monitoring is active
    /// and the authority is reachable.
    pub async fn poll_realtime_once(&self) {
        {
            let session = self.session.read().await;
            if !session.monitoring || !session.monitor.is_connected() {
                return;
            }
        }

        let response = match self.authority.realtime_devices().await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Realtime poll failed");
                return;
            }
        };

        let mut session = self.session.write().await;
        self.ingest_devices(&mut session, response.devices).await;
    }

    /// One incremental event poll.
    pub async fn poll_events_once(&self) {
        let response = match self.authority.list_new_events().await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Event poll failed");
                return;
            }
        };
        let events = response.into_events();
        if events.is_empty() {
            return;
        }

        let mut session = self.session.write().await;
        let inserted = session.log.merge_remote(events);
        if inserted > 0 {
            debug!(inserted, "Merged authority events");
        }
    }

    /// Diff one device snapshot and apply the arrival/departure policy.
    ///
    /// Both the regular and the realtime poll land here; identity-based
    /// diffing makes the second report of the same physical arrival a no-op.
    async fn ingest_devices(&self, session: &mut GuardSession, devices: Vec<UsbDevice>) {
        let now = Utc::now();
        let diff = session.registry.apply_snapshot(devices);

        for device in &diff.departures {
            session.log.record_local(departure_event(device, now));
            self.emit(GuardEvent::DeviceRemoved {
                name: device.display_name().to_string(),
            });
        }

        for device in &diff.arrivals {
            let identity = device.identity();
            session.log.record_local(arrival_event(device, now));
            self.emit(GuardEvent::DeviceArrived {
                name: device.display_name().to_string(),
            });

            if let Err(err) = self.authority.block_device_mount(identity.as_str()).await {
                warn!(device = %identity, error = %err, "Failed to block device mount");
            }

            if session.gate.state() == GateState::Locked {
                match session
                    .gate
                    .issue_challenge(ChallengeOrigin::NewDevice(identity), now)
                    .await
                {
                    Ok(challenge) => self.emit(GuardEvent::ChallengeIssued {
                        expires_at: challenge.expires_at,
                    }),
                    Err(GateError::NotPermitted) => {}
                    Err(err) => self.emit(GuardEvent::ChallengeIssueFailed {
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start monitoring, with auto-mount blocking requested server-side.
    pub async fn start_monitoring(&self) -> Result<(), OrchestratorError> {
        self.authority.start_monitoring(true).await?;
        if let Err(err) = self.authority.enable_protection().await {
            warn!(error = %err, "Failed to enable protection");
        }

        let mut session = self.session.write().await;
        session.monitoring = true;
        session.auto_started = true;
        self.emit(GuardEvent::MonitoringStarted);
        Ok(())
    }

    pub async fn stop_monitoring(&self) -> Result<(), OrchestratorError> {
        self.authority.stop_monitoring().await?;

        let mut session = self.session.write().await;
        session.monitoring = false;
        self.emit(GuardEvent::MonitoringStopped);
        Ok(())
    }

    /// Issue a challenge on operator request.
    pub async fn generate_challenge(&self) -> Result<Challenge, OrchestratorError> {
        let mut session = self.session.write().await;
        match session
            .gate
            .issue_challenge(ChallengeOrigin::Operator, Utc::now())
            .await
        {
            Ok(challenge) => {
                self.emit(GuardEvent::ChallengeIssued {
                    expires_at: challenge.expires_at,
                });
                Ok(challenge)
            }
            Err(err) => {
                if matches!(err, GateError::ChallengeIssueFailed(_)) {
                    self.emit(GuardEvent::ChallengeIssueFailed {
                        message: err.to_string(),
                    });
                }
                Err(err.into())
            }
        }
    }

    /// Submit a verification code against the active challenge.
    pub async fn verify(&self, code: &str) -> Result<(), OrchestratorError> {
        let mut session = self.session.write().await;
        match session.gate.verify(code, Utc::now()).await {
            Ok(()) => {
                self.emit(GuardEvent::AccessGranted);
                Ok(())
            }
            Err(err) => {
                if let GateError::VerificationFailed(message) = &err {
                    self.emit(GuardEvent::AccessDenied {
                        message: message.clone(),
                    });
                }
                Err(err.into())
            }
        }
    }

    /// Operator override of the system-wide blocking mode.
    pub async fn set_blocking(&self, blocked: bool) -> Result<(), OrchestratorError> {
        let mut session = self.session.write().await;
        session.gate.set_blocking(blocked).await?;
        self.emit(GuardEvent::BlockingChanged { blocked });
        Ok(())
    }

    /// Re-lock immediately without consulting the authority.
    pub async fn force_lock(&self) {
        let mut session = self.session.write().await;
        session.gate.force_lock();
        self.emit(GuardEvent::ForcedLock);
    }

    fn emit(&self, event: GuardEvent) {
        // No subscribers is fine; the core runs headless too.
        let _ = self.event_tx.send(event);
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Ticker for a serialized poll loop.
///
/// `Delay` means a tick that comes due while a request is still in flight is
/// pushed back instead of bursting, which is the per-endpoint in-flight rule.
fn poll_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_recommended_cadences() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.probe_interval, Duration::from_secs(2));
        assert_eq!(config.device_poll_interval, Duration::from_millis(500));
        assert_eq!(config.event_poll_interval, Duration::from_secs(1));
        assert_eq!(config.realtime_poll_interval, Duration::from_millis(250));
        assert_eq!(config.event_log_capacity, 150);
    }
}
