//! Edge-triggered liveness tracking for the authority link.
//!
//! The monitor folds a stream of probe outcomes into a connection state and
//! emits a transition only when the state actually flips. Repeated identical
//! probe results are self-loops and produce nothing, so downstream policy
//! (force-lock on disconnect, auto-start on connect) fires exactly once per
//! physical transition.

use chrono::{DateTime, Utc};
use guard_protocol_types::ConnectionStatus;
use tracing::info;

/// Link state as seen by the probe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No probe has completed yet.
    Unknown,
    Connected,
    Disconnected,
}

/// A state flip worth acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEdge {
    /// The authority became reachable.
    Connected,
    /// The authority stopped answering after having been reachable.
    Disconnected,
}

/// Folds probe outcomes into edge events.
///
/// `Unknown -> Connected` emits a connect edge (the session just found its
/// authority); `Unknown -> Disconnected` is silent because there was never a
/// live link to lose.
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: LinkState,
    last_transition_at: Option<DateTime<Utc>>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            state: LinkState::Unknown,
            last_transition_at: None,
        }
    }

    /// Record one probe outcome and return the edge it produced, if any.
    pub fn observe(&mut self, probe_ok: bool, now: DateTime<Utc>) -> Option<ConnectionEdge> {
        let previous = self.state;
        self.state = if probe_ok {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };

        if self.state == previous {
            return None;
        }

        match (previous, self.state) {
            (LinkState::Connected, LinkState::Disconnected) => {
                self.last_transition_at = Some(now);
                info!("Authority link lost");
                Some(ConnectionEdge::Disconnected)
            }
            (_, LinkState::Connected) => {
                self.last_transition_at = Some(now);
                info!("Authority link established");
                Some(ConnectionEdge::Connected)
            }
            // Unknown -> Disconnected: record the flip, emit nothing.
            _ => {
                self.last_transition_at = Some(now);
                None
            }
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Read-only status for the combined snapshot.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            last_transition_at: self.last_transition_at,
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
