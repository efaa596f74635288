//! The owned session context.
//!
//! Replaces scattered component-local state with a single struct created on
//! session start and torn down on session end. Each field has exactly one
//! owner; the orchestrator hands out read-only snapshots.

use authority_client::Authority;
use authorization_gate::{AuthorizationGate, GateState};
use connection_monitor::ConnectionMonitor;
use device_registry::DeviceRegistry;
use event_log::EventLog;
use guard_protocol_types::{AuthorizationState, ConnectionStatus, SecurityEvent, UsbDevice};
use std::sync::Arc;

/// Mutable state of one monitoring session.
pub(crate) struct GuardSession {
    pub(crate) monitor: ConnectionMonitor,
    pub(crate) registry: DeviceRegistry,
    pub(crate) log: EventLog,
    pub(crate) gate: AuthorizationGate,
    /// Server-side monitoring flag, mirrored from device-list responses.
    pub(crate) monitoring: bool,
    /// Guard so auto-start fires once per connection, not on every tick.
    pub(crate) auto_started: bool,
}

impl GuardSession {
    pub(crate) fn new(authority: Arc<dyn Authority>, event_log_capacity: usize) -> Self {
        Self {
            monitor: ConnectionMonitor::new(),
            registry: DeviceRegistry::new(),
            log: EventLog::with_capacity(event_log_capacity),
            gate: AuthorizationGate::new(authority),
            monitoring: false,
            auto_started: false,
        }
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connection: self.monitor.status(),
            devices: self.registry.devices().to_vec(),
            events: self.log.to_vec(),
            authorization: self.gate.authorization(),
            gate: self.gate.state(),
            monitoring: self.monitoring,
            challenge_expires_at: self.gate.active_challenge().map(|c| c.expires_at),
            qr_code_url: self.gate.qr_code_url().map(|url| url.to_string()),
        }
    }
}

/// Read-only combined view handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub connection: ConnectionStatus,
    /// Current device set, newest poll, authority order.
    pub devices: Vec<UsbDevice>,
    /// Merged event log, newest first.
    pub events: Vec<SecurityEvent>,
    pub authorization: AuthorizationState,
    pub gate: GateState,
    pub monitoring: bool,
    /// Expiry of the challenge awaiting verification, if any.
    pub challenge_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// QR image URL for the active challenge, if the authority supplied one.
    pub qr_code_url: Option<String>,
}
